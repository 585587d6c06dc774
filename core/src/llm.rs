use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, ChatCompletionTool, ChatCompletionToolArgs,
        ChatCompletionToolChoiceOption, ChatCompletionToolType, CreateChatCompletionRequestArgs,
        FunctionObjectArgs, ImageDetail, ImageUrlArgs,
    },
    Client,
};
use anyhow::Result;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ModelError;
use crate::registry::ToolDeclaration;

/// One piece of model input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputPart {
    Image { mime_type: String, data: Vec<u8> },
    Text(String),
}

impl InputPart {
    pub fn jpeg(data: impl Into<Vec<u8>>) -> Self {
        InputPart::Image {
            mime_type: "image/jpeg".to_string(),
            data: data.into(),
        }
    }
}

/// One piece of a model turn, in the order the model produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Text(String),
    /// `arguments` is whatever the provider sent. Text that does not parse
    /// as JSON is kept as `Value::String` and only judged if the call is
    /// acted on.
    ToolCall { name: String, arguments: Value },
}

/// Whether the model may call the declared tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    /// The model decides.
    #[default]
    Auto,
    None,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub inputs: Vec<InputPart>,
    pub tools: Vec<ToolDeclaration>,
    pub tool_mode: ToolMode,
}

impl GenerateRequest {
    /// A plain text prompt with no tools attached.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            inputs: vec![InputPart::Text(prompt.into())],
            tool_mode: ToolMode::None,
            ..Default::default()
        }
    }
}

/// A generative model that can see images and call declared tools.
///
/// Shared across concurrent diagnosis cycles, hence `Send + Sync`.
#[async_trait]
pub trait ModelEndpoint: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<Vec<ResponsePart>, ModelError>;
}

impl From<OpenAIError> for ModelError {
    fn from(err: OpenAIError) -> Self {
        match err {
            OpenAIError::JSONDeserialize(e) => ModelError::MalformedResponse(e.to_string()),
            other => ModelError::Request(other.to_string()),
        }
    }
}

/// Chat-completions backed endpoint.
pub struct Brain {
    client: Client<OpenAIConfig>,
    model: String,
}

impl Brain {
    pub fn new(config: &Config) -> Self {
        let mut openai = OpenAIConfig::new().with_api_key(config.api_key.clone());
        if let Some(base) = &config.base_url {
            openai = openai.with_api_base(base.clone());
        }
        // Errors go straight back to the caller; the cycle never retries.
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        let client = Client::with_config(openai).with_backoff(no_retry);

        info!("Brain connected. Model: {}", config.model);
        Self {
            client,
            model: config.model.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Connectivity check used at startup.
    pub async fn say_hello(&self) -> Result<String> {
        let parts = self
            .generate(GenerateRequest::text("Hello! Reply with 'System Online'."))
            .await?;
        Ok(parts
            .into_iter()
            .filter_map(|p| match p {
                ResponsePart::Text(t) => Some(t),
                ResponsePart::ToolCall { .. } => None,
            })
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn user_message(inputs: &[InputPart]) -> Result<ChatCompletionRequestMessage, OpenAIError> {
        let mut content = Vec::with_capacity(inputs.len());
        for input in inputs {
            let part = match input {
                InputPart::Text(text) => ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartTextArgs::default()
                        .text(text.as_str())
                        .build()?,
                ),
                InputPart::Image { mime_type, data } => {
                    let url = format!("data:{};base64,{}", mime_type, STANDARD.encode(data));
                    ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImageArgs::default()
                            .image_url(
                                ImageUrlArgs::default()
                                    .url(url)
                                    .detail(ImageDetail::Auto)
                                    .build()?,
                            )
                            .build()?,
                    )
                }
            };
            content.push(part);
        }

        Ok(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(content))
                .build()?,
        ))
    }

    fn tool(decl: &ToolDeclaration) -> Result<ChatCompletionTool, OpenAIError> {
        ChatCompletionToolArgs::default()
            .r#type(ChatCompletionToolType::Function)
            .function(
                FunctionObjectArgs::default()
                    .name(&decl.name)
                    .description(&decl.description)
                    .parameters(decl.parameters.clone())
                    .build()?,
            )
            .build()
    }
}

#[async_trait]
impl ModelEndpoint for Brain {
    async fn generate(&self, request: GenerateRequest) -> Result<Vec<ResponsePart>, ModelError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(instruction) = &request.system_instruction {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(instruction.as_str())
                    .build()?,
            ));
        }
        messages.push(Self::user_message(&request.inputs)?);

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages);
        if !request.tools.is_empty() {
            let tools = request
                .tools
                .iter()
                .map(Self::tool)
                .collect::<Result<Vec<_>, _>>()?;
            let choice = match request.tool_mode {
                ToolMode::Auto => ChatCompletionToolChoiceOption::Auto,
                ToolMode::None => ChatCompletionToolChoiceOption::None,
            };
            builder.tools(tools).tool_choice(choice);
        }
        let chat_request = builder.build()?;

        let response = self.client.chat().create(chat_request).await?;
        let Some(choice) = response.choices.into_iter().next() else {
            warn!("Model returned no choices.");
            return Ok(Vec::new());
        };

        let mut parts = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            parts.push(ResponsePart::Text(text));
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            parts.push(ResponsePart::ToolCall {
                arguments: raw_arguments(call.function.arguments),
                name: call.function.name,
            });
        }
        Ok(parts)
    }
}

// The wire format carries tool arguments as a JSON-encoded string.
fn raw_arguments(raw: String) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}
