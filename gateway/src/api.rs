use serde::{Deserialize, Serialize};

// Input: an uploaded field sample
#[derive(Debug, Deserialize)]
pub struct DiagnoseRequest {
    pub image_base64: String,      // JPEG bytes, base64 encoded
    #[serde(default)]
    pub language: Option<String>,  // Falls back to the configured default
}

// Output: the report shown to the grower
#[derive(Debug, Serialize, Deserialize)]
pub struct DiagnoseResponse {
    pub diagnosis: String,
    pub logged: bool,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub const LOGGED_BANNER: &str =
    "CRITICAL THREAT DETECTED: Incident automatically logged to the outbreak registry.";
pub const CLEAR_BANNER: &str =
    "ANALYSIS COMPLETE: No critical threat requiring database log.";
