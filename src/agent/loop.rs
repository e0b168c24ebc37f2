//! Agent turn loop.
//!
//! One `run()` call processes one user message: compact the session if it has
//! outgrown its context budget, build the system prompt, append the user
//! message, then loop — model completion, concurrent tool execution, record
//! results — until the model answers without tool calls or the turn budget
//! runs out.

use std::sync::Arc;

use futures::future;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::agent::compaction;
use crate::agent::context::ContextBuilder;
use crate::config::expand_tilde;
use crate::error::Result;
use crate::memory::Memory;
use crate::providers::{ChatOptions, LLMProvider, LLMToolCall};
use crate::session::{Message, Session, ToolCall, ToolResult};
use crate::tools::{ToolContext, ToolRegistry};

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Identity used in session keys and logs
    pub agent_id: String,
    /// Base system prompt
    pub system_prompt: String,
    /// Model override; empty uses the provider default
    pub model: String,
    /// Max tokens per completion
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Max model/tool rounds per request
    pub max_turns: usize,
    /// Model context window, in tokens
    pub context_window: usize,
    /// Compact once the session estimate reaches this fraction of the window
    pub compaction_threshold: f32,
    /// Messages kept verbatim after compaction
    pub compaction_keep_last: usize,
    /// Workspace directory for file tools and memory
    pub workspace_dir: String,
    /// Timezone label injected into the system prompt; empty means UTC
    pub timezone: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: "main".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            model: String::new(),
            max_tokens: 4096,
            temperature: 0.7,
            max_turns: 10,
            context_window: 128_000,
            compaction_threshold: 0.7,
            compaction_keep_last: 10,
            workspace_dir: "~/.tabby/workspace".to_string(),
            timezone: String::new(),
        }
    }
}

/// Best-effort observer hooks fired during a run.
///
/// Failures are logged and never affect the turn outcome. All methods default
/// to no-ops; implement only what you need.
#[async_trait::async_trait]
pub trait AgentObserver: Send + Sync {
    /// A tool call was issued by the model.
    async fn on_tool_call(&self, _call_id: &str, _name: &str, _arguments: &Value) -> Result<()> {
        Ok(())
    }

    /// A tool call completed (successfully or with an `Error: …` result).
    async fn on_tool_result(&self, _call_id: &str, _name: &str, _result: &str) -> Result<()> {
        Ok(())
    }

    /// A non-empty final reply was produced.
    async fn on_reply(&self, _content: &str) -> Result<()> {
        Ok(())
    }
}

/// Core agent: builds context, calls the model, executes tools, loops.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tabby::agent::{Agent, AgentConfig};
/// use tabby::providers::AnthropicProvider;
/// use tabby::session::Session;
/// use tabby::tools::ToolRegistry;
///
/// let provider = Arc::new(AnthropicProvider::new("api-key"));
/// let agent = Agent::new(provider, ToolRegistry::new(), AgentConfig::default());
///
/// let mut session = Session::new("agent:main:cli:direct:local");
/// let reply = agent.run("Hello!", &mut session, "", "user").await?;
/// ```
pub struct Agent {
    provider: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    memory: Option<Arc<Memory>>,
    config: AgentConfig,
    observers: Vec<Arc<dyn AgentObserver>>,
}

impl Agent {
    /// Create a new agent.
    pub fn new(provider: Arc<dyn LLMProvider>, tools: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            provider,
            tools: Arc::new(tools),
            memory: None,
            config,
            observers: Vec::new(),
        }
    }

    /// Attach workspace memory; its identity and facts feed the system prompt.
    pub fn with_memory(mut self, memory: Arc<Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Register an observer for tool-call/reply hooks.
    pub fn add_observer(&mut self, observer: Arc<dyn AgentObserver>) {
        self.observers.push(observer);
    }

    /// The agent configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The tool registry.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Process a user message against a session and return the final reply.
    ///
    /// # Arguments
    /// * `user_text` - The user's input
    /// * `session` - Conversation history (caller holds the per-key lock)
    /// * `extra_system` - Additional text appended to the system prompt
    /// * `sender_id` - Sender identity for the authorized-senders section
    ///
    /// # Errors
    /// Model-backend failures are returned to the caller; everything else
    /// (tool errors, summarization errors, observer errors) is absorbed.
    pub async fn run(
        &self,
        user_text: &str,
        session: &mut Session,
        extra_system: &str,
        sender_id: &str,
    ) -> Result<String> {
        self.maybe_compact(session).await;

        let system = self.build_system(extra_system, sender_id);

        session.append(Message::user(user_text)).await;

        let definitions = self.tools.definitions();
        let options = self.chat_options();

        let mut final_reply: Option<String> = None;
        let mut last_content = String::new();

        for turn in 1..=self.config.max_turns {
            debug!(
                agent = %self.config.agent_id,
                turn,
                max_turns = self.config.max_turns,
                "Turn start"
            );

            let response = match self
                .provider
                .complete(&session.messages, Some(&system), &definitions, &options)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!(turn, error = %e, "Model completion failed");
                    return Err(e);
                }
            };

            let recorded_calls: Vec<ToolCall> = response
                .tool_calls
                .iter()
                .map(|c| ToolCall::new(&c.id, &c.name, c.arguments.clone()))
                .collect();
            session
                .append(Message::assistant_with_tools(
                    response.content.clone(),
                    recorded_calls,
                ))
                .await;

            last_content = response.content.clone().unwrap_or_default();

            if !response.has_tool_calls() {
                final_reply = Some(last_content.clone());
                break;
            }

            let results = self.execute_tools(&response.tool_calls).await;
            session.append(Message::tool_results(results)).await;
        }

        let reply = match final_reply {
            Some(reply) => reply,
            None => {
                warn!(
                    agent = %self.config.agent_id,
                    max_turns = self.config.max_turns,
                    "Reached max turns, returning last assistant content"
                );
                last_content
            }
        };

        if !reply.is_empty() {
            self.notify_reply(&reply).await;
        }

        Ok(reply)
    }

    /// Compact the session when its token estimate crosses the threshold.
    ///
    /// A session holding `keep_last` messages or fewer is never compacted,
    /// even over threshold.
    async fn maybe_compact(&self, session: &mut Session) {
        let estimate = session.estimate_tokens();
        let threshold =
            (self.config.context_window as f32 * self.config.compaction_threshold) as usize;
        if estimate < threshold {
            return;
        }

        let keep_last = self.config.compaction_keep_last;
        if session.len() <= keep_last {
            return;
        }

        info!(
            agent = %self.config.agent_id,
            estimate,
            threshold,
            "Compacting session"
        );

        let split = session.len() - keep_last;
        let to_summarize = session.messages[..split].to_vec();
        let summary = compaction::summarize(
            self.provider.as_ref(),
            self.summarizer_model(),
            &to_summarize,
        )
        .await;

        session.compact(&summary, keep_last).await;
    }

    fn build_system(&self, extra_system: &str, sender_id: &str) -> String {
        let mut builder =
            ContextBuilder::new(&self.config.system_prompt).with_timezone(&self.config.timezone);
        if let Some(memory) = &self.memory {
            builder = builder
                .with_identity(&memory.identity_text())
                .with_memory(&memory.memory_text());
        }
        builder.build(sender_id, extra_system)
    }

    fn chat_options(&self) -> ChatOptions {
        let mut options = ChatOptions::new()
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);
        if !self.config.model.is_empty() {
            options = options.with_model(&self.config.model);
        }
        options
    }

    fn summarizer_model(&self) -> Option<&str> {
        if self.config.model.is_empty() {
            None
        } else {
            Some(&self.config.model)
        }
    }

    /// Execute all tool calls of one turn concurrently.
    ///
    /// Results come back in the original call order regardless of completion
    /// order.
    async fn execute_tools(&self, calls: &[LLMToolCall]) -> Vec<ToolResult> {
        let workspace = expand_tilde(&self.config.workspace_dir);
        let ctx = ToolContext::new().with_workspace(&workspace.to_string_lossy());

        let futures = calls.iter().map(|call| self.execute_one(call, &ctx));
        future::join_all(futures).await
    }

    async fn execute_one(&self, call: &LLMToolCall, ctx: &ToolContext) -> ToolResult {
        info!(tool = %call.name, id = %call.id, "Executing tool");
        self.notify_tool_call(call).await;

        let result = self
            .tools
            .execute(&call.name, call.arguments.clone(), ctx)
            .await;

        self.notify_tool_result(call, &result).await;
        debug!(tool = %call.name, id = %call.id, result_len = result.len(), "Tool finished");
        ToolResult::new(&call.id, &call.name, &result)
    }

    async fn notify_tool_call(&self, call: &LLMToolCall) {
        for observer in &self.observers {
            if let Err(e) = observer
                .on_tool_call(&call.id, &call.name, &call.arguments)
                .await
            {
                warn!(error = %e, "on_tool_call observer failed");
            }
        }
    }

    async fn notify_tool_result(&self, call: &LLMToolCall, result: &str) {
        for observer in &self.observers {
            if let Err(e) = observer
                .on_tool_result(&call.id, &call.name, result)
                .await
            {
                warn!(error = %e, "on_tool_result observer failed");
            }
        }
    }

    async fn notify_reply(&self, reply: &str) {
        for observer in &self.observers {
            if let Err(e) = observer.on_reply(reply).await {
                warn!(error = %e, "on_reply observer failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TabbyError;
    use crate::providers::{LLMResponse, ToolDefinition};
    use crate::session::Role;
    use crate::tools::EchoTool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Provider that pops scripted responses; repeats the last one when the
    /// script runs dry.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<LLMResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<LLMResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(
            &self,
            _messages: &[Message],
            _system: Option<&str>,
            _tools: &[ToolDefinition],
            _options: &ChatOptions,
        ) -> crate::error::Result<LLMResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                Ok(responses.pop_front().unwrap())
            } else {
                responses
                    .front()
                    .cloned()
                    .ok_or_else(|| TabbyError::Provider("script exhausted".into()))
            }
        }
        fn default_model(&self) -> &str {
            "scripted"
        }
        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn echo_agent(provider: ScriptedProvider, config: AgentConfig) -> Agent {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(EchoTool));
        Agent::new(Arc::new(provider), tools, config)
    }

    #[tokio::test]
    async fn test_simple_reply() {
        let agent = echo_agent(
            ScriptedProvider::new(vec![LLMResponse::text("hello back")]),
            AgentConfig::default(),
        );
        let mut session = Session::new("test");

        let reply = agent.run("hello", &mut session, "", "").await.unwrap();

        assert_eq!(reply, "hello back");
        assert_eq!(session.len(), 2);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_tool_loop_records_paired_results() {
        let agent = echo_agent(
            ScriptedProvider::new(vec![
                LLMResponse::with_tools(
                    None,
                    vec![
                        LLMToolCall::new("c1", "echo", json!({"message": "one"})),
                        LLMToolCall::new("c2", "echo", json!({"message": "two"})),
                        LLMToolCall::new("c3", "missing_tool", json!({})),
                    ],
                ),
                LLMResponse::text("all done"),
            ]),
            AgentConfig::default(),
        );
        let mut session = Session::new("test");

        let reply = agent.run("go", &mut session, "", "").await.unwrap();
        assert_eq!(reply, "all done");

        // user, assistant(tool calls), tool results, assistant(final)
        assert_eq!(session.len(), 4);
        let assistant = &session.messages[1];
        assert_eq!(assistant.tool_calls.len(), 3);

        let tool_msg = &session.messages[2];
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.tool_results.len(), 3);
        for (call, result) in assistant.tool_calls.iter().zip(&tool_msg.tool_results) {
            assert_eq!(call.id, result.call_id);
        }
        assert_eq!(tool_msg.tool_results[0].content, "one");
        assert_eq!(tool_msg.tool_results[1].content, "two");
        assert_eq!(
            tool_msg.tool_results[2].content,
            "Error: unknown tool 'missing_tool'"
        );
    }

    #[tokio::test]
    async fn test_max_turns_terminates() {
        let looping = LLMResponse::with_tools(
            Some("still working".into()),
            vec![LLMToolCall::new("c", "echo", json!({"message": "again"}))],
        );
        let provider = ScriptedProvider::new(vec![looping]);
        let config = AgentConfig {
            max_turns: 3,
            ..AgentConfig::default()
        };
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(EchoTool));
        let provider = Arc::new(provider);
        let agent = Agent::new(provider.clone(), tools, config);

        let mut session = Session::new("test");
        let reply = agent.run("go", &mut session, "", "").await.unwrap();

        assert_eq!(provider.call_count(), 3);
        assert_eq!(reply, "still working");
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let agent = echo_agent(ScriptedProvider::new(vec![]), AgentConfig::default());
        let mut session = Session::new("test");

        let result = agent.run("hello", &mut session, "", "").await;
        assert!(matches!(result, Err(TabbyError::Provider(_))));
        // The user message was already appended before the failure
        assert_eq!(session.len(), 1);
    }

    #[tokio::test]
    async fn test_compaction_triggered_before_turn() {
        // Tiny context window so any prior history is over threshold
        let config = AgentConfig {
            context_window: 10,
            compaction_keep_last: 10,
            ..AgentConfig::default()
        };
        let provider = ScriptedProvider::new(vec![
            LLMResponse::text("summarized: long chat"),
            LLMResponse::text("final answer"),
        ]);
        let agent = echo_agent(provider, config);

        let mut session = Session::new("test");
        for i in 0..15 {
            session
                .append(Message::user(&format!(
                    "a reasonably long message number {}",
                    i
                )))
                .await;
        }

        let reply = agent.run("next", &mut session, "", "").await.unwrap();
        assert_eq!(reply, "final answer");

        assert_eq!(session.compacted_count, 5);
        assert_eq!(session.messages[0].role, Role::System);
        assert!(session.messages[0]
            .text()
            .contains("[Summary of 5 earlier messages]"));
        assert!(session.messages[0].text().contains("summarized: long chat"));
        // summary + 10 kept + user + assistant
        assert_eq!(session.len(), 13);
    }

    #[tokio::test]
    async fn test_small_session_never_compacted() {
        let config = AgentConfig {
            context_window: 1,
            compaction_keep_last: 10,
            ..AgentConfig::default()
        };
        let agent = echo_agent(
            ScriptedProvider::new(vec![LLMResponse::text("ok")]),
            config,
        );

        let mut session = Session::new("test");
        for i in 0..5 {
            session.append(Message::user(&format!("msg {}", i))).await;
        }

        agent.run("next", &mut session, "", "").await.unwrap();
        assert_eq!(session.compacted_count, 0);
    }

    #[tokio::test]
    async fn test_observers_fire_and_failures_are_absorbed() {
        struct CountingObserver {
            calls: AtomicUsize,
            results: AtomicUsize,
            replies: AtomicUsize,
        }

        #[async_trait]
        impl AgentObserver for CountingObserver {
            async fn on_tool_call(
                &self,
                _id: &str,
                _name: &str,
                _args: &Value,
            ) -> crate::error::Result<()> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            async fn on_tool_result(
                &self,
                _id: &str,
                _name: &str,
                _result: &str,
            ) -> crate::error::Result<()> {
                self.results.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            async fn on_reply(&self, _content: &str) -> crate::error::Result<()> {
                self.replies.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        struct FailingObserver;

        #[async_trait]
        impl AgentObserver for FailingObserver {
            async fn on_reply(&self, _content: &str) -> crate::error::Result<()> {
                Err(TabbyError::Channel("observer exploded".into()))
            }
        }

        let mut agent = echo_agent(
            ScriptedProvider::new(vec![
                LLMResponse::with_tools(
                    None,
                    vec![LLMToolCall::new("c1", "echo", json!({"message": "x"}))],
                ),
                LLMResponse::text("done"),
            ]),
            AgentConfig::default(),
        );
        let counting = Arc::new(CountingObserver {
            calls: AtomicUsize::new(0),
            results: AtomicUsize::new(0),
            replies: AtomicUsize::new(0),
        });
        agent.add_observer(counting.clone());
        agent.add_observer(Arc::new(FailingObserver));

        let mut session = Session::new("test");
        let reply = agent.run("go", &mut session, "", "").await.unwrap();

        assert_eq!(reply, "done");
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
        assert_eq!(counting.results.load(Ordering::SeqCst), 1);
        assert_eq!(counting.replies.load(Ordering::SeqCst), 1);
    }
}
