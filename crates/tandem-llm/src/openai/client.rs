// OpenAI-specific client implementation (HTTP direct, no SDK)

use crate::streaming::{parse_chat_sse_stream, StreamEvent};
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, TokenUsage};
use crate::types::{Content, Message, ToolCall};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use std::pin::Pin;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: OPENAI_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_chat_request(
        &self,
        model: &str,
        messages: Vec<Message>,
        options: &ChatOptions,
        stream: bool,
    ) -> Result<Value> {
        let openai_messages: Vec<Value> = messages
            .into_iter()
            .map(Self::convert_message)
            .collect::<Result<Vec<_>>>()?;

        let mut request = serde_json::json!({
            "model": model,
            "messages": openai_messages,
            "stream": stream,
        });

        let obj = request
            .as_object_mut()
            .context("chat request payload must be an object")?;

        if let Some(temp) = options.temperature {
            obj.insert("temperature".to_string(), serde_json::json!(temp));
        }
        if let Some(max_tokens) = options.max_tokens {
            obj.insert("max_tokens".to_string(), serde_json::json!(max_tokens));
        }
        if let Some(tools) = &options.tools {
            obj.insert("tools".to_string(), serde_json::to_value(tools)?);
        }
        if let Some(tool_choice) = &options.tool_choice {
            obj.insert("tool_choice".to_string(), serde_json::to_value(tool_choice)?);
        }

        Ok(request)
    }

    /// Convert our Message type to the chat completions wire format.
    fn convert_message(message: Message) -> Result<Value> {
        match message {
            Message::System { content, name } => {
                let mut obj = serde_json::json!({
                    "role": "system",
                    "content": Self::convert_content(content),
                });
                if let Some(name) = name {
                    obj.as_object_mut()
                        .expect("json! object")
                        .insert("name".to_string(), serde_json::json!(name));
                }
                Ok(obj)
            }
            Message::Human { content, name } => {
                let mut obj = serde_json::json!({
                    "role": "user",
                    "content": Self::convert_content(content),
                });
                if let Some(name) = name {
                    obj.as_object_mut()
                        .expect("json! object")
                        .insert("name".to_string(), serde_json::json!(name));
                }
                Ok(obj)
            }
            Message::AI {
                content,
                tool_calls,
                name: _,
            } => {
                let mut obj = serde_json::json!({ "role": "assistant" });
                let map = obj.as_object_mut().expect("json! object");
                map.insert(
                    "content".to_string(),
                    match content {
                        Some(c) => Value::String(c.to_text()),
                        None => Value::Null,
                    },
                );
                if let Some(calls) = tool_calls {
                    map.insert("tool_calls".to_string(), serde_json::to_value(&calls)?);
                }
                Ok(obj)
            }
            Message::Tool {
                tool_call_id,
                name: _,
                content,
            } => Ok(serde_json::json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": content.to_text(),
            })),
        }
    }

    fn convert_content(content: Content) -> Value {
        Value::String(content.to_text())
    }

    async fn post_chat(&self, payload: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(payload)
            .send()
            .await
            .context("OpenAI request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {}: {}", status, body);
        }

        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload =
            self.build_chat_request(&request.model, request.messages, &request.options, false)?;
        let response = self.post_chat(&payload).await?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .context("OpenAI response contained no choices")?;

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
            usage: body.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>> {
        let payload =
            self.build_chat_request(&request.model, request.messages, &request.options, true)?;
        let response = self.post_chat(&payload).await?;

        Ok(parse_chat_sse_stream(response))
    }
}
