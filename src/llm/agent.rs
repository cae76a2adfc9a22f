// SPDX-License-Identifier: MIT

//! Agents: prompt in, answer out
//!
//! `LlmAgent` sends the prompt to a model and executes the tool calls it asks
//! for, feeding results back, until the model answers with text.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use super::{Content, GenerationConfig, Model, Part, Tool};
use crate::error::AppError;

pub const DEFAULT_MAX_TURNS: u32 = 10;

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Model-driven agent with tool calling
pub struct LlmAgent {
    name: String,
    instruction: String,
    model: Arc<dyn Model>,
    tools: Vec<Arc<dyn Tool>>,
    tool_index: HashMap<String, usize>,
    generation: Option<GenerationConfig>,
    max_turns: u32,
}

impl LlmAgent {
    pub fn new(name: impl Into<String>, instruction: impl Into<String>, model: Arc<dyn Model>) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            model,
            tools: Vec::new(),
            tool_index: HashMap::new(),
            generation: None,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tool_index
            .insert(tool.name().to_string(), self.tools.len());
        self.tools.push(tool);
        self
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation = Some(config);
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    fn get_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tool_index.get(name).map(|&i| &self.tools[i])
    }

    /// Tool failures are reported back to the model rather than aborting the loop
    async fn call_tool(&self, name: &str, args: Value) -> Value {
        let Some(tool) = self.get_tool(name) else {
            log::error!("Tool {} not found", name);
            return json!({ "error": AppError::tool_not_found(name).to_string() });
        };
        match tool.execute(args).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Tool {} failed: {}", name, e);
                json!({ "error": e.to_string() })
            }
        }
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: String) -> Result<String, Box<dyn Error + Send + Sync>> {
        if input.trim().is_empty() {
            return Err(Box::new(AppError::invalid_input("input cannot be empty")));
        }

        let mut history = vec![Content::system(self.instruction.clone()), Content::user(input)];

        for turn in 0..self.max_turns {
            log::info!("Agent {} turn {}/{}", self.name, turn + 1, self.max_turns);
            let response = self
                .model
                .generate_content(&history, self.generation.as_ref(), Some(&self.tools))
                .await?;

            let calls: Vec<(String, String, Value)> = response
                .parts
                .iter()
                .filter_map(|part| match part {
                    Part::FunctionCall { id, name, args } => {
                        Some((id.clone(), name.clone(), args.clone()))
                    }
                    _ => None,
                })
                .collect();

            if calls.is_empty() {
                let text = response.text();
                if text.is_empty() {
                    log::warn!("Agent {} received an empty response", self.name);
                }
                return Ok(text);
            }

            history.push(response);
            for (id, name, args) in calls {
                log::info!("Tool call: {} {}", name, args);
                let result = self.call_tool(&name, args).await;
                log::debug!("Tool {} response: {}", name, result);
                history.push(Content {
                    role: "tool".to_string(),
                    parts: vec![Part::FunctionResponse {
                        id,
                        name,
                        response: result,
                    }],
                });
            }
        }

        log::error!("Agent {} reached max turns without text response", self.name);
        Err(Box::new(AppError::MaxIterations {
            kind: "turns".to_string(),
            limit: self.max_turns,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted responses and records each history it was sent
    struct MockModel {
        responses: Vec<Content>,
        index: AtomicUsize,
        seen: Mutex<Vec<Vec<Content>>>,
    }

    impl MockModel {
        fn new(responses: Vec<Content>) -> Self {
            Self {
                responses,
                index: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Model for MockModel {
        async fn generate_content(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
            _tools: Option<&[Arc<dyn Tool>]>,
        ) -> Result<Content, Box<dyn Error + Send + Sync>> {
            self.seen.lock().unwrap().push(history.to_vec());
            let i = self.index.fetch_add(1, Ordering::SeqCst);
            let last = self.responses.len() - 1;
            Ok(self.responses[i.min(last)].clone())
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its arguments"
        }

        fn schema(&self) -> &Value {
            static SCHEMA: once_cell::sync::Lazy<Value> =
                once_cell::sync::Lazy::new(|| json!({"type": "object"}));
            &SCHEMA
        }

        async fn execute(&self, input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
            Ok(json!({ "echoed": input }))
        }
    }

    fn text(t: &str) -> Content {
        Content {
            role: "model".to_string(),
            parts: vec![Part::Text(t.to_string())],
        }
    }

    fn call(id: &str, name: &str, args: Value) -> Content {
        Content {
            role: "model".to_string(),
            parts: vec![Part::FunctionCall {
                id: id.to_string(),
                name: name.to_string(),
                args,
            }],
        }
    }

    #[tokio::test]
    async fn test_direct_text_answer() {
        let model = Arc::new(MockModel::new(vec![text("Sunny and 75F")]));
        let agent = LlmAgent::new("weather", "You report weather.", model.clone());

        let answer = agent.run("Atlanta".to_string()).await.unwrap();
        assert_eq!(answer, "Sunny and 75F");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][0].role, "system");
        assert_eq!(seen[0][1].text(), "Atlanta");
    }

    #[tokio::test]
    async fn test_tool_result_fed_back() {
        let model = Arc::new(MockModel::new(vec![
            call("call_1", "echo", json!({"city": "Atlanta"})),
            text("done"),
        ]));
        let agent = LlmAgent::new("weather", "instr", model.clone()).with_tool(Arc::new(EchoTool));

        assert_eq!(agent.run("Atlanta".to_string()).await.unwrap(), "done");

        let seen = model.seen.lock().unwrap();
        let second = &seen[1];
        assert_eq!(second.len(), 4);
        match &second[3].parts[0] {
            Part::FunctionResponse { id, name, response } => {
                assert_eq!(id, "call_1");
                assert_eq!(name, "echo");
                assert_eq!(response["echoed"]["city"], "Atlanta");
            }
            other => panic!("expected function response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_reported_to_model() {
        let model = Arc::new(MockModel::new(vec![
            call("call_1", "teleport", json!({})),
            text("cannot do that"),
        ]));
        let agent = LlmAgent::new("weather", "instr", model.clone());

        assert_eq!(agent.run("go".to_string()).await.unwrap(), "cannot do that");
        let seen = model.seen.lock().unwrap();
        match &seen[1][3].parts[0] {
            Part::FunctionResponse { response, .. } => {
                assert_eq!(response["error"], "Tool 'teleport' not found");
            }
            other => panic!("expected function response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_max_turns() {
        let model = Arc::new(MockModel::new(vec![call("c", "echo", json!({}))]));
        let agent = LlmAgent::new("loop", "instr", model)
            .with_tool(Arc::new(EchoTool))
            .with_max_turns(3);

        let err = agent.run("hi".to_string()).await.unwrap_err();
        assert_eq!(err.to_string(), "Max turns reached: 3");
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let model = Arc::new(MockModel::new(vec![text("unused")]));
        let agent = LlmAgent::new("weather", "instr", model.clone());

        let err = agent.run("   ".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
        assert!(model.seen.lock().unwrap().is_empty());
    }
}
