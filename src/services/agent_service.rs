use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    constants::prompts::AGENT_SYSTEM_PROMPT,
    errors::{AppError, AppResult},
    services::{
        llm_client::{ChatMessage, ChatModel},
        tools::ToolRegistry,
    },
};

/// The conversational solver the control loop talks to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizAgent: Send + Sync {
    /// Send `prompt` within `session_id` and return the agent's final text.
    async fn run(&self, prompt: &str, session_id: &str) -> AppResult<String>;
    /// Forget everything said in `session_id`.
    async fn end_session(&self, session_id: &str);
}

/// Tool-using chat agent with per-session memory.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    max_tool_rounds: u32,
    sessions: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl Agent {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>, max_tool_rounds: u32) -> Self {
        Self {
            model,
            tools,
            max_tool_rounds,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn session_len(&self, session_id: &str) -> usize {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    async fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| vec![ChatMessage::system(AGENT_SYSTEM_PROMPT)])
    }

    async fn store(&self, session_id: &str, messages: Vec<ChatMessage>) {
        self.sessions
            .lock()
            .await
            .insert(session_id.to_string(), messages);
    }
}

#[async_trait]
impl QuizAgent for Agent {
    async fn run(&self, prompt: &str, session_id: &str) -> AppResult<String> {
        let mut messages = self.history(session_id).await;
        messages.push(ChatMessage::user(prompt));
        let definitions = self.tools.definitions();

        for round in 0..self.max_tool_rounds {
            let reply = match self.model.complete(&messages, &definitions).await {
                Ok(reply) => reply,
                Err(e) => {
                    self.store(session_id, messages).await;
                    return Err(e);
                }
            };
            messages.push(ChatMessage::assistant(&reply));

            if !reply.wants_tools() {
                let content = reply.content.unwrap_or_default();
                self.store(session_id, messages).await;
                return Ok(content);
            }

            log::debug!(
                "Session {} round {}: {} tool call(s)",
                session_id,
                round + 1,
                reply.tool_calls.len()
            );
            for call in &reply.tool_calls {
                let output = self
                    .tools
                    .invoke(&call.function.name, &call.function.arguments)
                    .await;
                messages.push(ChatMessage::tool_result(call.id.clone(), output));
            }
        }

        self.store(session_id, messages).await;
        Err(AppError::Agent(format!(
            "no final answer after {} tool rounds",
            self.max_tool_rounds
        )))
    }

    async fn end_session(&self, session_id: &str) {
        self.sessions.lock().await.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm_client::{
        AssistantReply, FunctionCall, MockChatModel, Role, ToolCall,
    };
    use crate::services::tools::{parameters_schema, Tool};
    use mockall::Sequence;
    use serde_json::Value;

    struct AddTool;

    #[derive(serde::Deserialize, schemars::JsonSchema)]
    struct AddArgs {
        a: i64,
        b: i64,
    }

    #[async_trait]
    impl Tool for AddTool {
        fn name(&self) -> &'static str {
            "add"
        }
        fn description(&self) -> &'static str {
            "Add two integers"
        }
        fn parameters(&self) -> Value {
            parameters_schema::<AddArgs>()
        }
        async fn call(&self, arguments: Value) -> AppResult<String> {
            let args: AddArgs = crate::services::tools::parse_arguments("add", arguments)?;
            Ok((args.a + args.b).to_string())
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new(1_000);
        registry.register(Arc::new(AddTool));
        Arc::new(registry)
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> AssistantReply {
        AssistantReply {
            content: None,
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
        }
    }

    #[tokio::test]
    async fn executes_tools_until_final_text() {
        let mut model = MockChatModel::new();
        let mut seq = Sequence::new();
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|messages, tools| {
                messages.len() == 2 && messages[0].role == Role::System && tools.len() == 1
            })
            .returning(|_, _| Ok(tool_call("call_1", "add", r#"{"a": 40, "b": 2}"#)));
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|messages, _| {
                let last = messages.last().unwrap();
                last.role == Role::Tool
                    && last.tool_call_id.as_deref() == Some("call_1")
                    && serde_json::to_value(&last.content).unwrap() == "42"
            })
            .returning(|_, _| Ok(AssistantReply::text(r#"{"answer_payload": {"answer": 42}}"#)));

        let agent = Agent::new(Arc::new(model), registry(), 5);
        let out = agent.run("What is 40 + 2?", "session-a").await.unwrap();

        assert_eq!(out, r#"{"answer_payload": {"answer": 42}}"#);
        // system, user, assistant(tool call), tool, assistant(final)
        assert_eq!(agent.session_len("session-a").await, 5);
    }

    #[tokio::test]
    async fn sessions_keep_history_and_are_isolated() {
        let mut model = MockChatModel::new();
        model
            .expect_complete()
            .times(3)
            .returning(|messages, _| Ok(AssistantReply::text(format!("seen {}", messages.len()))));

        let agent = Agent::new(Arc::new(model), registry(), 5);

        assert_eq!(agent.run("first", "s1").await.unwrap(), "seen 2");
        assert_eq!(agent.run("second", "s1").await.unwrap(), "seen 4");
        assert_eq!(agent.run("other", "s2").await.unwrap(), "seen 2");

        agent.end_session("s1").await;
        assert_eq!(agent.session_len("s1").await, 0);
        assert_eq!(agent.session_len("s2").await, 3);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_model() {
        let mut model = MockChatModel::new();
        let mut seq = Sequence::new();
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(tool_call("call_x", "launch_rocket", "{}")));
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|messages, _| {
                serde_json::to_value(&messages.last().unwrap().content).unwrap()
                    == "Error: unknown tool 'launch_rocket'"
            })
            .returning(|_, _| Ok(AssistantReply::text("ok")));

        let agent = Agent::new(Arc::new(model), registry(), 5);
        assert_eq!(agent.run("go", "s").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn tool_round_limit_is_an_agent_error() {
        let mut model = MockChatModel::new();
        model
            .expect_complete()
            .times(2)
            .returning(|_, _| Ok(tool_call("call", "add", r#"{"a": 1, "b": 1}"#)));

        let agent = Agent::new(Arc::new(model), registry(), 2);
        let err = agent.run("loop forever", "s").await.unwrap_err();

        assert!(matches!(err, AppError::Agent(_)));
    }

    #[tokio::test]
    async fn model_errors_propagate() {
        let mut model = MockChatModel::new();
        model
            .expect_complete()
            .times(1)
            .returning(|_, _| Err(AppError::Configuration("AI_TOKEN not found".to_string())));

        let agent = Agent::new(Arc::new(model), registry(), 2);
        assert!(matches!(
            agent.run("hi", "s").await,
            Err(AppError::Configuration(_))
        ));
    }
}
