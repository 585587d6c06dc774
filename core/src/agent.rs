//! The diagnosis cycle: one tool-enabled model call, an optional outbreak
//! record, and an optional tool-free summarization call.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::DiagnosisError;
use crate::language::Language;
use crate::llm::{GenerateRequest, InputPart, ModelEndpoint, ResponsePart, ToolMode};
use crate::outbreak::OutbreakRecorder;
use crate::registry::{OutbreakReport, ToolDeclaration, LOG_THRESHOLD_PERCENT};

pub const SYSTEM_INSTRUCTION: &str =
    "You are an expert AI Botanist. You can see images. Analyze the plant health.";

pub const EMPTY_FALLBACK: &str = "Analysis complete. Check the logs for details.";

const TEXT_SEPARATOR: &str = "\n\n";

/// What the caller gets back from a cycle. `text` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub text: String,
    /// True iff the outbreak recorder succeeded during this cycle.
    pub logged: bool,
}

/// First-pass model output split into its text and the tool call we act on.
#[derive(Debug, Default, PartialEq)]
struct Decomposed {
    text: String,
    tool_call: Option<serde_json::Value>,
}

pub struct PlantDoctor {
    model: Arc<dyn ModelEndpoint>,
    recorder: Arc<dyn OutbreakRecorder>,
    tool: ToolDeclaration,
}

impl PlantDoctor {
    pub fn new(model: Arc<dyn ModelEndpoint>, recorder: Arc<dyn OutbreakRecorder>) -> Self {
        Self {
            model,
            recorder,
            tool: ToolDeclaration::log_outbreak(),
        }
    }

    /// Runs one diagnosis cycle for a JPEG image. Never fails: every error
    /// is folded into the returned text.
    pub async fn diagnose(&self, image: &[u8], language: &Language) -> DiagnosisResult {
        let mut logged = false;
        let text = match self.run_cycle(image, language, &mut logged).await {
            Ok(text) if text.trim().is_empty() => EMPTY_FALLBACK.to_string(),
            Ok(text) => text,
            Err(e) => {
                error!("Diagnosis cycle failed: {}", e);
                format!(
                    "I analyzed the image, but encountered a processing error: {}",
                    e
                )
            }
        };
        DiagnosisResult { text, logged }
    }

    async fn run_cycle(
        &self,
        image: &[u8],
        language: &Language,
        logged: &mut bool,
    ) -> Result<String, DiagnosisError> {
        let parts = self
            .model
            .generate(GenerateRequest {
                system_instruction: Some(SYSTEM_INSTRUCTION.to_string()),
                inputs: vec![
                    InputPart::jpeg(image),
                    InputPart::Text(diagnosis_prompt(&self.tool.name, language)),
                ],
                tools: vec![self.tool.clone()],
                tool_mode: ToolMode::Auto,
            })
            .await?;

        let decomposed = decompose(parts, &self.tool.name);
        let Some(arguments) = decomposed.tool_call else {
            info!("Brain decided NO tool was needed. Returning first-pass text.");
            return Ok(decomposed.text);
        };

        let report = OutbreakReport::from_arguments(&arguments)?;
        info!(
            "Model calling tool '{}': {} on {} ({}%, {})",
            self.tool.name, report.disease, report.plant, report.confidence, report.severity
        );

        match self.recorder.record(&report).await {
            Ok(id) => {
                info!("Outbreak recorded with id {}", id);
                *logged = true;
            }
            Err(e) => warn!("Outbreak could not be recorded, continuing: {}", e),
        }

        let summary = self
            .model
            .generate(GenerateRequest::text(summary_prompt(
                &report,
                *logged,
                &decomposed.text,
                language,
            )))
            .await?;
        Ok(decompose(summary, &self.tool.name).text)
    }
}

/// Joins text parts in order and keeps the first call to `tool_name`.
fn decompose(parts: Vec<ResponsePart>, tool_name: &str) -> Decomposed {
    let mut texts = Vec::new();
    let mut tool_call = None;

    for part in parts {
        match part {
            ResponsePart::Text(t) if t.is_empty() => {}
            ResponsePart::Text(t) => texts.push(t),
            ResponsePart::ToolCall { name, arguments } if name == tool_name => {
                if tool_call.is_none() {
                    tool_call = Some(arguments);
                } else {
                    warn!("Ignoring repeated '{}' call in the same turn", name);
                }
            }
            ResponsePart::ToolCall { name, .. } => {
                warn!("Brain hallucinated a tool that was not declared: {}", name);
            }
        }
    }

    Decomposed {
        text: texts.join(TEXT_SEPARATOR),
        tool_call,
    }
}

fn diagnosis_prompt(tool_name: &str, language: &Language) -> String {
    format!(
        "Analyze this plant image.\n\
         1. Identify the plant and any disease (or say 'Healthy').\n\
         2. If a specific disease is detected with >{}% confidence, CALL the '{}' function \
         before responding further. Report confidence as a percentage between 0 and 100.\n\
         3. After the tool call (or if no tool is needed), provide a diagnosis and exactly 3 \
         organic remedies in {} language.",
        LOG_THRESHOLD_PERCENT, tool_name, language
    )
}

fn summary_prompt(
    report: &OutbreakReport,
    logged: bool,
    thoughts: &str,
    language: &Language,
) -> String {
    let action = if logged {
        "and logged it to the outbreak registry"
    } else {
        "but could not log it to the outbreak registry"
    };
    format!(
        "I just detected {} on {} ({} severity) {}. Current thoughts: {}. \
         Please write a clean, helpful diagnosis and exactly 3 organic remedies for the user \
         in {} language.",
        report.disease, report.plant, report.severity, action, thoughts, language
    )
}
