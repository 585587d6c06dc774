use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use crate::error::ToolArgumentError;

pub const LOG_OUTBREAK: &str = "log_outbreak";

/// Diseases below this confidence (percent) should not be logged.
/// Advisory only: it is stated to the model, never enforced here.
pub const LOG_THRESHOLD_PERCENT: f64 = 70.0;

// A callable tool as the model sees it: name, prose, and a JSON Schema for
// the arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDeclaration {
    /// The `log_outbreak` tool. Confidence is a percentage in `[0, 100]`.
    pub fn log_outbreak() -> Self {
        Self {
            name: LOG_OUTBREAK.to_string(),
            description: format!(
                "Logs a disease to the database. Call this if confidence > {}%.",
                LOG_THRESHOLD_PERCENT
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "plant": { "type": "string", "description": "Common name of the plant" },
                    "disease": { "type": "string", "description": "Name of the detected disease" },
                    "confidence": {
                        "type": "number",
                        "minimum": 0,
                        "maximum": 100,
                        "description": "Diagnosis confidence as a percentage"
                    },
                    "severity": {
                        "type": "string",
                        "enum": Severity::VOCABULARY,
                    }
                },
                "required": ["plant", "disease", "confidence", "severity"]
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const VOCABULARY: [&'static str; 4] = ["Low", "Medium", "High", "Critical"];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated arguments of a `log_outbreak` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutbreakReport {
    pub plant: String,
    pub disease: String,
    pub confidence: f64,
    pub severity: Severity,
}

impl OutbreakReport {
    pub fn from_arguments(args: &Value) -> Result<Self, ToolArgumentError> {
        let decoded;
        let args = match args {
            Value::Object(map) => map,
            // Some providers double-encode; anything else is unusable.
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => {
                    decoded = map;
                    &decoded
                }
                _ => return Err(ToolArgumentError::Malformed(raw.clone())),
            },
            other => return Err(ToolArgumentError::Malformed(other.to_string())),
        };

        let plant = required_str(args, "plant")?;
        let disease = required_str(args, "disease")?;

        let confidence = match required(args, "confidence")? {
            Value::Number(n) => n.as_f64().ok_or(ToolArgumentError::Invalid {
                field: "confidence",
                reason: "not representable as a number".to_string(),
            })?,
            other => return Err(wrong_type("confidence", "a number", other)),
        };
        if !(0.0..=100.0).contains(&confidence) {
            return Err(ToolArgumentError::Invalid {
                field: "confidence",
                reason: format!("{} is outside 0..=100", confidence),
            });
        }

        let severity_raw = required_str(args, "severity")?;
        let severity = Severity::parse(&severity_raw).ok_or_else(|| ToolArgumentError::Invalid {
            field: "severity",
            reason: format!(
                "'{}' is not one of {}",
                severity_raw,
                Severity::VOCABULARY.join(", ")
            ),
        })?;

        Ok(Self {
            plant,
            disease,
            confidence,
            severity,
        })
    }
}

fn required<'a>(
    args: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, ToolArgumentError> {
    match args.get(field) {
        None | Some(Value::Null) => Err(ToolArgumentError::Missing(field)),
        Some(value) => Ok(value),
    }
}

fn required_str(
    args: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ToolArgumentError> {
    match required(args, field)? {
        Value::String(s) if s.trim().is_empty() => Err(ToolArgumentError::Missing(field)),
        Value::String(s) => Ok(s.trim().to_string()),
        other => Err(wrong_type(field, "a string", other)),
    }
}

fn wrong_type(field: &'static str, expected: &str, got: &Value) -> ToolArgumentError {
    ToolArgumentError::Invalid {
        field,
        reason: format!("expected {}, got {}", expected, got),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_call_is_accepted() {
        let report = OutbreakReport::from_arguments(&json!({
            "plant": "Tomato",
            "disease": "Blight",
            "confidence": 85,
            "severity": "high"
        }))
        .unwrap();

        assert_eq!(report.plant, "Tomato");
        assert_eq!(report.disease, "Blight");
        assert_eq!(report.confidence, 85.0);
        assert_eq!(report.severity, Severity::High);
    }

    #[test]
    fn each_missing_field_is_reported() {
        let full = json!({
            "plant": "Tomato",
            "disease": "Blight",
            "confidence": 85,
            "severity": "High"
        });
        for field in ["plant", "disease", "confidence", "severity"] {
            let mut partial = full.clone();
            partial.as_object_mut().unwrap().remove(field);
            assert_eq!(
                OutbreakReport::from_arguments(&partial),
                Err(ToolArgumentError::Missing(field))
            );
        }
    }

    #[test]
    fn mistyped_fields_are_rejected() {
        let err = OutbreakReport::from_arguments(&json!({
            "plant": "Tomato",
            "disease": "Blight",
            "confidence": "85",
            "severity": "High"
        }))
        .unwrap_err();
        assert!(matches!(err, ToolArgumentError::Invalid { field: "confidence", .. }));

        let err = OutbreakReport::from_arguments(&json!({
            "plant": "Tomato",
            "disease": "Blight",
            "confidence": 85,
            "severity": "apocalyptic"
        }))
        .unwrap_err();
        assert!(matches!(err, ToolArgumentError::Invalid { field: "severity", .. }));
    }

    #[test]
    fn confidence_must_be_a_percentage() {
        let err = OutbreakReport::from_arguments(&json!({
            "plant": "Rice",
            "disease": "Blast",
            "confidence": 140,
            "severity": "Low"
        }))
        .unwrap_err();
        assert!(matches!(err, ToolArgumentError::Invalid { field: "confidence", .. }));
    }

    #[test]
    fn unparseable_arguments_are_a_schema_violation() {
        let err = OutbreakReport::from_arguments(&Value::String("{plant".into())).unwrap_err();
        assert_eq!(err, ToolArgumentError::Malformed("{plant".into()));

        let err = OutbreakReport::from_arguments(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, ToolArgumentError::Malformed(_)));
    }

    #[test]
    fn double_encoded_arguments_are_accepted() {
        let raw = json!({
            "plant": "Chili",
            "disease": "Leaf Curl",
            "confidence": 77.5,
            "severity": "Medium"
        })
        .to_string();
        let report = OutbreakReport::from_arguments(&Value::String(raw)).unwrap();
        assert_eq!(report.disease, "Leaf Curl");
        assert_eq!(report.severity, Severity::Medium);
    }

    #[test]
    fn declaration_requires_all_fields() {
        let decl = ToolDeclaration::log_outbreak();
        assert_eq!(decl.name, LOG_OUTBREAK);
        assert!(decl.description.contains("70%"));
        let required = decl.parameters["required"].as_array().unwrap();
        assert_eq!(required.len(), 4);
    }
}
