//! Bedrock Converse client with ordered model fallback.

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_bedrockruntime::types::{
    ContentBlock as BedrockContentBlock, ConversationRole, InferenceConfiguration,
    Message as BedrockMessage, SystemContentBlock, Tool as BedrockTool, ToolConfiguration,
    ToolInputSchema, ToolResultBlock, ToolResultContentBlock, ToolResultStatus, ToolSpecification,
    ToolUseBlock,
};
use aws_sdk_bedrockruntime::Client as BedrockClient;
use ledgergraph::{Error, Result};

use crate::document::{document_to_json, json_to_document};

/// One tool exposed to the model: name, description and a JSON schema for
/// its input.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// Content block of a conversation turn or a model response.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: Vec<ContentBlock>,
}

impl ConversationTurn {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    #[must_use]
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
            }],
        }
    }
}

/// A completion request: optional system prompt, conversation turns and
/// optionally bound tools.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub messages: Vec<ConversationTurn>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// A single-turn request, the shape every non-agent LLM pass uses.
    #[must_use]
    pub fn single_turn(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            messages: vec![ConversationTurn::user(user)],
            tools: Vec::new(),
            max_tokens: 2048,
            temperature: 0.3,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A model response: content blocks plus the stop reason.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
}

impl Completion {
    /// Concatenated text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// The first tool-use block, if the model called a tool.
    #[must_use]
    pub fn tool_use(&self) -> Option<(&str, &str, &serde_json::Value)> {
        self.content.iter().find_map(|b| match b {
            ContentBlock::ToolUse { id, name, input } => {
                Some((id.as_str(), name.as_str(), input))
            }
            _ => None,
        })
    }
}

/// The seam the pipeline's LLM passes are written against. Tests stub it;
/// production wires [`ChatBedrock`].
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;

    /// Single-turn convenience returning the concatenated text.
    async fn complete_text(&self, system: &str, user: &str) -> Result<String> {
        let completion = self
            .complete(CompletionRequest::single_turn(system, user))
            .await?;
        Ok(completion.text())
    }
}

/// Claude via the Bedrock Converse API.
///
/// Uses the standard AWS credential chain. On throttling the client walks
/// the configured ordered fallback model list and retries the same
/// request.
#[derive(Clone)]
pub struct ChatBedrock {
    client: BedrockClient,
    model_id: String,
    fallback_model_ids: Vec<String>,
}

impl ChatBedrock {
    pub async fn new(region: impl Into<String>) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;
        Self {
            client: BedrockClient::new(&config),
            model_id: "anthropic.claude-3-5-sonnet-20241022-v2:0".to_string(),
            fallback_model_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    #[must_use]
    pub fn with_fallback_models(mut self, model_ids: Vec<String>) -> Self {
        self.fallback_model_ids = model_ids;
        self
    }

    fn convert_messages(
        request: &CompletionRequest,
    ) -> Result<(Vec<BedrockMessage>, Option<Vec<SystemContentBlock>>)> {
        let mut messages = Vec::with_capacity(request.messages.len());
        for turn in &request.messages {
            let role = match turn.role {
                TurnRole::User => ConversationRole::User,
                TurnRole::Assistant => ConversationRole::Assistant,
            };
            let mut builder = BedrockMessage::builder().role(role);
            for block in &turn.content {
                let converted = match block {
                    ContentBlock::Text(text) => BedrockContentBlock::Text(text.clone()),
                    ContentBlock::ToolUse { id, name, input } => BedrockContentBlock::ToolUse(
                        ToolUseBlock::builder()
                            .tool_use_id(id)
                            .name(name)
                            .input(json_to_document(input)?)
                            .build()
                            .map_err(|e| Error::other(e.to_string()))?,
                    ),
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    } => BedrockContentBlock::ToolResult(
                        ToolResultBlock::builder()
                            .tool_use_id(tool_use_id)
                            .content(ToolResultContentBlock::Text(content.clone()))
                            .status(ToolResultStatus::Success)
                            .build()
                            .map_err(|e| Error::other(e.to_string()))?,
                    ),
                };
                builder = builder.content(converted);
            }
            messages.push(builder.build().map_err(|e| Error::other(e.to_string()))?);
        }

        let system = request
            .system
            .as_ref()
            .map(|s| vec![SystemContentBlock::Text(s.clone())]);
        Ok((messages, system))
    }

    fn convert_tools(request: &CompletionRequest) -> Result<Option<ToolConfiguration>> {
        if request.tools.is_empty() {
            return Ok(None);
        }
        let mut tools = Vec::with_capacity(request.tools.len());
        for tool in &request.tools {
            let spec = ToolSpecification::builder()
                .name(&tool.name)
                .description(&tool.description)
                .input_schema(ToolInputSchema::Json(json_to_document(&tool.input_schema)?))
                .build()
                .map_err(|e| Error::other(e.to_string()))?;
            tools.push(BedrockTool::ToolSpec(spec));
        }
        Ok(Some(
            ToolConfiguration::builder()
                .set_tools(Some(tools))
                .build()
                .map_err(|e| Error::other(e.to_string()))?,
        ))
    }

    async fn converse_once(
        &self,
        model_id: &str,
        request: &CompletionRequest,
    ) -> Result<Completion> {
        let (messages, system) = Self::convert_messages(request)?;
        let tool_config = Self::convert_tools(request)?;

        let mut call = self
            .client
            .converse()
            .model_id(model_id)
            .set_messages(Some(messages))
            .set_system(system)
            .inference_config(
                InferenceConfiguration::builder()
                    .max_tokens(request.max_tokens as i32)
                    .temperature(request.temperature)
                    .build(),
            );
        if let Some(config) = tool_config {
            call = call.tool_config(config);
        }

        let output = call.send().await.map_err(|err| {
            let message = err.to_string();
            let service = format!("{:?}", err.into_service_error());
            if service.contains("ThrottlingException")
                || message.to_lowercase().contains("throttl")
                || message.contains("Too many requests")
            {
                Error::throttled(format!("Bedrock model {model_id}: {service}"))
            } else {
                Error::Api {
                    status: 502,
                    message: format!("Bedrock API error for {model_id}: {service}"),
                }
            }
        })?;

        let mut completion = Completion {
            content: Vec::new(),
            stop_reason: Some(format!("{:?}", output.stop_reason())),
        };
        if let Some(aws_sdk_bedrockruntime::types::ConverseOutput::Message(message)) = output.output
        {
            for block in message.content {
                match block {
                    BedrockContentBlock::Text(text) => {
                        completion.content.push(ContentBlock::Text(text));
                    }
                    BedrockContentBlock::ToolUse(tool_use) => {
                        completion.content.push(ContentBlock::ToolUse {
                            id: tool_use.tool_use_id,
                            name: tool_use.name,
                            input: document_to_json(tool_use.input)?,
                        });
                    }
                    other => {
                        tracing::debug!(block = ?other, "ignoring unhandled Bedrock content block");
                    }
                }
            }
        }
        Ok(completion)
    }
}

#[async_trait]
impl CompletionModel for ChatBedrock {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let mut last_error = None;
        for model_id in std::iter::once(&self.model_id).chain(self.fallback_model_ids.iter()) {
            match self.converse_once(model_id, &request).await {
                Ok(completion) => {
                    tracing::debug!(model = %model_id, "completion succeeded");
                    return Ok(completion);
                }
                Err(err @ Error::Throttled(_)) => {
                    tracing::warn!(model = %model_id, "model throttled, trying next fallback");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_error
            .unwrap_or_else(|| Error::other("no Bedrock models configured")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_accessors() {
        let completion = Completion {
            content: vec![
                ContentBlock::Text("Hello ".into()),
                ContentBlock::ToolUse {
                    id: "tu_1".into(),
                    name: "graph_query".into(),
                    input: serde_json::json!({"query_text": "cities"}),
                },
                ContentBlock::Text("world".into()),
            ],
            stop_reason: None,
        };
        assert_eq!(completion.text(), "Hello world");
        let (id, name, input) = completion.tool_use().unwrap();
        assert_eq!(id, "tu_1");
        assert_eq!(name, "graph_query");
        assert_eq!(input["query_text"], "cities");
    }

    #[test]
    fn single_turn_request_defaults() {
        let req = CompletionRequest::single_turn("system", "user").with_max_tokens(4096);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.max_tokens, 4096);
        assert!(req.tools.is_empty());
    }
}
