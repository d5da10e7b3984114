//! The conversational database assistant

use std::sync::Arc;

use tracing::{info, info_span, Instrument};

use crate::agent::agentic_loop::{
    run_agentic_loop, AgentLoopInput, LoopCallback, LoopConfig, LoopTrace, NoOpCallback,
};
use crate::agent::client::{ChatModel, OpenAiClient};
use crate::agent::memory::ConversationMemory;
use crate::agent::prompts;
use crate::agent::types::Message;
use crate::config::Config;
use crate::database::DatabaseGateway;
use crate::error::Result;
use crate::tools::ToolRegistry;

/// Outcome of one completed turn
#[derive(Debug)]
pub struct TurnReport {
    /// The reply shown to the user
    pub reply: String,
    /// What the loop did to produce it
    pub trace: LoopTrace,
}

/// Chat model, tools, and memory wired into a turn-by-turn assistant
pub struct DatabaseAssistant {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    memory: ConversationMemory,
    system_prompt: String,
    loop_config: LoopConfig,
}

impl DatabaseAssistant {
    /// Assemble an assistant from its parts
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: ToolRegistry,
        memory: ConversationMemory,
        system_prompt: impl Into<String>,
        loop_config: LoopConfig,
    ) -> Self {
        DatabaseAssistant {
            model,
            tools,
            memory,
            system_prompt: system_prompt.into(),
            loop_config,
        }
    }

    /// Build an assistant backed by the OpenAI client from configuration
    pub fn from_config(config: &Config, gateway: Arc<dyn DatabaseGateway>) -> Result<Self> {
        let model = Arc::new(OpenAiClient::new(config.openai.clone())?);
        Self::with_model(config, model, gateway)
    }

    /// Build an assistant around any chat model, using the agent settings from `config`
    pub fn with_model(
        config: &Config,
        model: Arc<dyn ChatModel>,
        gateway: Arc<dyn DatabaseGateway>,
    ) -> Result<Self> {
        let agent = &config.agent;
        let system_prompt =
            prompts::system_prompt(agent.system_prompt_file.as_deref(), &agent.managed_tables)?;

        Ok(Self::new(
            model,
            ToolRegistry::new(gateway),
            ConversationMemory::new(agent.memory),
            system_prompt,
            LoopConfig::from_agent_config(agent),
        ))
    }

    /// Answer one user message.
    ///
    /// On success the input and reply are appended to memory. Provider
    /// failures return `Err` and leave memory untouched.
    pub async fn run_agent(&mut self, input: &str) -> Result<String> {
        Ok(self.run_agent_with_callback(input, &NoOpCallback).await?.reply)
    }

    /// Like [`DatabaseAssistant::run_agent`], reporting progress to `callback`
    pub async fn run_agent_with_callback(
        &mut self,
        input: &str,
        callback: &dyn LoopCallback,
    ) -> Result<TurnReport> {
        let span = info_span!("turn", session = %self.memory.session_id(), model = self.model.model_name());

        let mut messages = Vec::with_capacity(self.memory.len() * 2 + 2);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(self.memory.messages());
        messages.push(Message::user(input));

        let output = run_agentic_loop(AgentLoopInput {
            messages,
            model: self.model.as_ref(),
            tools: &self.tools,
            config: &self.loop_config,
            callback,
        })
        .instrument(span)
        .await?;

        info!(
            outcome = ?output.trace.outcome,
            tool_calls = output.trace.actions().count(),
            "Turn complete"
        );

        self.memory.record_turn(input, &output.response);

        Ok(TurnReport {
            reply: output.response,
            trace: output.trace,
        })
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Forget the conversation and start a new session
    pub fn reset(&mut self) {
        self.memory.clear();
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::Role;
    use crate::error::Error;
    use crate::testing::{InMemoryGateway, ScriptedModel};

    fn assistant(model: Arc<ScriptedModel>) -> DatabaseAssistant {
        DatabaseAssistant::with_model(&Config::default(), model, Arc::new(InMemoryGateway::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_starts_with_system_prompt() {
        let model = Arc::new(ScriptedModel::new().with_reply("Hi there."));
        let mut assistant = assistant(model.clone());

        assistant.run_agent("hello").await.unwrap();

        let request = &model.requests()[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("'customer', 'project', and 'tasks'"));
        assert_eq!(request.messages[1], Message::user("hello"));
        assert_eq!(request.tools.len(), 2);
        assert_eq!(request.options.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_failed_turn_leaves_memory_untouched() {
        let model = Arc::new(
            ScriptedModel::new()
                .with_reply("First answer.")
                .with_error(Error::Provider("API error (500): upstream".into())),
        );
        let mut assistant = assistant(model);

        assistant.run_agent("first").await.unwrap();
        assert!(assistant.run_agent("second").await.is_err());

        assert_eq!(assistant.memory().len(), 1);
        assert_eq!(assistant.memory().turns()[0].user, "first");
    }

    #[tokio::test]
    async fn test_reset_clears_memory() {
        let model = Arc::new(ScriptedModel::new().with_reply("Noted."));
        let mut assistant = assistant(model);

        assistant.run_agent("remember this").await.unwrap();
        assistant.reset();

        assert!(assistant.memory().is_empty());
    }
}
