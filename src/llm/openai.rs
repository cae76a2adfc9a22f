// SPDX-License-Identifier: MIT

//! OpenAI-compatible chat-completions backend

use super::{Content, GenerationConfig, Model, Part, Tool};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;

use crate::config::{ModelConfig, DEFAULT_OPENAI_BASE_URL};
use crate::error::{AppError, ModelError};

pub struct OpenAIModel {
    client: Client,
    api_key: Option<String>,
    model_name: String,
    base_url: String,
    temperature: Option<f32>,
}

impl OpenAIModel {
    /// The API key may only be omitted for a custom (e.g. local) `base_url`.
    pub fn new(config: &ModelConfig) -> Result<Self, AppError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if config.api_key.is_none() && base_url == DEFAULT_OPENAI_BASE_URL {
            return Err(ModelError::ApiKeyMissing("openai".to_string()).into());
        }

        Ok(Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            model_name: config.model_name.clone(),
            base_url,
            temperature: config.temperature,
        })
    }

    fn content_to_openai_message(content: &Content) -> Value {
        let role = match content.role.as_str() {
            "model" => "assistant",
            other => other,
        };

        if let Some(Part::FunctionResponse { id, response, .. }) = content
            .parts
            .iter()
            .find(|p| matches!(p, Part::FunctionResponse { .. }))
        {
            return json!({
                "role": "tool",
                "tool_call_id": id,
                "content": response.to_string()
            });
        }

        let mut tool_calls = Vec::new();
        let mut text = String::new();
        for part in &content.parts {
            match part {
                Part::Text(t) => text.push_str(t),
                Part::FunctionCall { id, name, args } => tool_calls.push(json!({
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": args.to_string()
                    }
                })),
                Part::FunctionResponse { .. } => {}
            }
        }

        if tool_calls.is_empty() {
            json!({ "role": role, "content": text })
        } else {
            json!({
                "role": role,
                "content": if text.is_empty() { Value::Null } else { json!(text) },
                "tool_calls": tool_calls
            })
        }
    }

    fn tools_to_openai_format(tools: &[Arc<dyn Tool>]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.schema()
                    }
                })
            })
            .collect()
    }

    fn parse_openai_response(response: &Value) -> Result<Content, ModelError> {
        let message = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .map(|choice| &choice["message"])
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".to_string()))?;

        let mut parts = Vec::new();
        if let Some(content) = message["content"].as_str() {
            if !content.is_empty() {
                parts.push(Part::Text(content.to_string()));
            }
        }

        if let Some(tool_calls) = message["tool_calls"].as_array() {
            for (i, tc) in tool_calls.iter().enumerate() {
                let name = tc["function"]["name"].as_str().ok_or_else(|| {
                    ModelError::InvalidResponse("tool call without a function name".to_string())
                })?;
                let id = tc["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{}", i));
                // arguments arrive as a JSON-encoded string
                let args = tc["function"]["arguments"]
                    .as_str()
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_else(|| json!({}));

                parts.push(Part::FunctionCall {
                    id,
                    name: name.to_string(),
                    args,
                });
            }
        }

        Ok(Content {
            role: "model".to_string(),
            parts,
        })
    }
}

#[async_trait]
impl Model for OpenAIModel {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, Box<dyn Error + Send + Sync>> {
        let url = format!("{}/chat/completions", self.base_url);

        let messages: Vec<Value> = history
            .iter()
            .map(Self::content_to_openai_message)
            .collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages
        });

        if let Some(temp) = config.and_then(|c| c.temperature).or(self.temperature) {
            body["temperature"] = json!(temp);
        }
        if let Some(cfg) = config {
            if let Some(max_tokens) = cfg.max_output_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
        }

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            body["tools"] = json!(Self::tools_to_openai_format(tools));
            body["tool_choice"] = json!("auto");
        }

        log::debug!("OpenAI request body: {}", body);

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(Box::new(ModelError::RateLimited { retry_after_secs }));
        }
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(Box::new(AppError::api("openai", format!("{}: {}", status, text))));
        }

        let resp_json: Value = resp.json().await?;
        log::debug!("OpenAI response: {}", resp_json);

        Ok(Self::parse_openai_response(&resp_json)?)
    }
}
