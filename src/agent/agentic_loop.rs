//! The function-calling loop behind one conversational turn.
//!
//! Calls the model, executes the tool calls it requests in order, feeds the
//! results back, and repeats until the model answers in plain text or a
//! limit is hit. Provider failures abort the turn; tool failures become
//! ordinary tool messages.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::agent::client::ChatModel;
use crate::agent::types::*;
use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::tools::{ToolCall, ToolRegistry};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tool message for calls requested after the budget is spent.
pub const TOOL_LIMIT_MESSAGE: &str = "Tool error: tool call limit reached";

/// Configurable limits for the agentic loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum model round-trips before the loop is forcefully stopped.
    pub max_iterations: u32,
    /// Maximum total tool calls across all iterations.
    pub max_tool_calls: u32,
    /// Generation options sent with every request.
    pub generation_options: GenerationOptions,
    /// Reply used when the loop exits without a final answer.
    pub fallback_message: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from_agent_config(&AgentConfig::default())
    }
}

impl LoopConfig {
    /// Limits taken from the agent configuration, temperature fixed at 0.
    pub fn from_agent_config(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            max_tool_calls: config.max_tool_calls,
            generation_options: GenerationOptions::precise(),
            fallback_message:
                "I'm sorry, I couldn't complete that request. Could you rephrase it or give me more details?"
                    .into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Structured trace types
// ---------------------------------------------------------------------------

/// A recorded action (tool call) and its observation (result).
#[derive(Debug, Clone)]
pub struct ToolAction {
    pub tool_name: String,
    pub arguments: String,
    pub observation: ToolObservation,
}

/// The result of executing a single tool call.
#[derive(Debug, Clone)]
pub struct ToolObservation {
    /// False for unknown tools and rejected arguments.
    pub success: bool,
    /// Exactly what the model was shown.
    pub content: String,
    pub duration_ms: u64,
}

/// One iteration of the agentic loop.
#[derive(Debug, Clone)]
pub struct LoopStep {
    pub iteration: u32,
    /// Text content produced by the model in this iteration (may be empty).
    pub thought: String,
    /// Tool calls executed in this iteration.
    pub actions: Vec<ToolAction>,
    /// The model's finish_reason for this iteration.
    pub finish_reason: String,
    pub timestamp: Instant,
}

/// Full trace of a loop execution.
#[derive(Debug, Clone)]
pub struct LoopTrace {
    pub steps: Vec<LoopStep>,
    pub outcome: LoopOutcome,
    pub total_duration_ms: u64,
}

impl LoopTrace {
    /// Every tool action across all steps, in execution order.
    pub fn actions(&self) -> impl Iterator<Item = &ToolAction> {
        self.steps.iter().flat_map(|step| step.actions.iter())
    }
}

/// How the loop finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model answered in plain text.
    Completed,
    /// Hit `max_iterations` without a final answer.
    MaxIterationsExceeded,
    /// Hit `max_tool_calls`; final answer taken from a tool-less call.
    ToolLimitReached,
    /// The model returned neither content nor tool calls.
    EmptyResponse,
}

// ---------------------------------------------------------------------------
// Callback trait
// ---------------------------------------------------------------------------

/// Hooks for callers that want to show progress while a turn runs.
#[async_trait]
pub trait LoopCallback: Send + Sync {
    /// Called at the start of each iteration, before the model call.
    async fn on_iteration_start(&self, _iteration: u32) {}
    /// Called after each individual tool has been executed.
    async fn on_tool_executed(&self, _tool_name: &str, _observation: &ToolObservation) {}
    /// Called at the end of each iteration, after all tool results are collected.
    async fn on_iteration_end(&self, _step: &LoopStep) {}
    /// Called once after the loop terminates.
    async fn on_loop_complete(&self, _trace: &LoopTrace) {}
}

/// Default no-op callback.
#[derive(Debug, Default)]
pub struct NoOpCallback;

#[async_trait]
impl LoopCallback for NoOpCallback {}

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Everything the loop needs to run.
pub struct AgentLoopInput<'a> {
    /// System instruction, remembered history and the user input.
    pub messages: Vec<Message>,
    /// Model to call.
    pub model: &'a dyn ChatModel,
    /// Tool registry to execute tools against.
    pub tools: &'a ToolRegistry,
    /// Loop configuration.
    pub config: &'a LoopConfig,
    /// Event callback.
    pub callback: &'a dyn LoopCallback,
}

/// The result of running the agentic loop.
#[derive(Debug)]
pub struct AgentLoopOutput {
    /// The final assistant response text.
    pub response: String,
    /// Structured trace of the full execution.
    pub trace: LoopTrace,
    /// Accumulated token usage across all iterations.
    pub total_usage: Usage,
}

// ---------------------------------------------------------------------------
// Core loop implementation
// ---------------------------------------------------------------------------

/// Run one turn of the function-calling loop.
pub async fn run_agentic_loop(input: AgentLoopInput<'_>) -> Result<AgentLoopOutput> {
    let AgentLoopInput {
        mut messages,
        model,
        tools,
        config,
        callback,
    } = input;

    let loop_start = Instant::now();
    let tool_definitions = tools.definitions();

    let mut iteration: u32 = 0;
    let mut tool_calls_made: u32 = 0;
    let mut steps: Vec<LoopStep> = Vec::new();
    let mut total_usage = Usage::default();

    let (final_response, outcome) = loop {
        iteration += 1;
        let iter_start = Instant::now();

        if iteration > config.max_iterations {
            warn!("Agent loop exceeded {} iterations", config.max_iterations);
            break (config.fallback_message.clone(), LoopOutcome::MaxIterationsExceeded);
        }

        info!("Agent loop iteration {}/{}", iteration, config.max_iterations);
        callback.on_iteration_start(iteration).await;

        // Once the tool budget is spent the model has to answer in text
        let use_tools = tool_calls_made < config.max_tool_calls && !tool_definitions.is_empty();
        let offered = if use_tools {
            tool_definitions.clone()
        } else {
            Vec::new()
        };

        let response = model
            .complete(messages.clone(), offered, config.generation_options.clone())
            .await?;

        if let Some(usage) = response.usage {
            total_usage += usage;
        }

        let Some(choice) = response.choices.into_iter().next() else {
            return Err(Error::Provider("Completion contained no choices".into()));
        };

        let finish_reason = choice.finish_reason.unwrap_or_else(|| "unknown".into());
        let message = choice.message;
        let requested = message.requested_tool_calls().to_vec();

        debug!(
            finish_reason = %finish_reason,
            has_content = !message.content.is_empty(),
            tool_calls = requested.len(),
            "Model replied"
        );

        // --- Tool calls ----------------------------------------------------
        if use_tools && !requested.is_empty() {
            info!(
                "Model requested {} tool calls (total so far: {})",
                requested.len(),
                tool_calls_made
            );

            let thought = message.content.clone();
            messages.push(message);

            let mut actions = Vec::with_capacity(requested.len());
            for tc in &requested {
                let action = if tool_calls_made >= config.max_tool_calls {
                    warn!(
                        "Skipping tool {}: limit of {} calls reached",
                        tc.function.name, config.max_tool_calls
                    );
                    refused_tool_call(tc)
                } else {
                    tool_calls_made += 1;
                    execute_tool_call(tools, tc).await
                };
                messages.push(Message::tool(&tc.id, &action.observation.content));
                callback.on_tool_executed(&action.tool_name, &action.observation).await;
                actions.push(action);
            }

            let step = LoopStep {
                iteration,
                thought,
                actions,
                finish_reason,
                timestamp: iter_start,
            };
            callback.on_iteration_end(&step).await;
            steps.push(step);
            continue;
        }

        let step = LoopStep {
            iteration,
            thought: message.content.clone(),
            actions: Vec::new(),
            finish_reason,
            timestamp: iter_start,
        };
        callback.on_iteration_end(&step).await;
        steps.push(step);

        // --- Plain text: final answer --------------------------------------
        if !message.content.is_empty() {
            debug!("Agent reply: {}", preview(&message.content, 500));
            let outcome = if use_tools {
                LoopOutcome::Completed
            } else {
                LoopOutcome::ToolLimitReached
            };
            break (message.content, outcome);
        }

        warn!("Model returned neither content nor tool calls");
        break (config.fallback_message.clone(), LoopOutcome::EmptyResponse);
    };

    let total_duration_ms = loop_start.elapsed().as_millis() as u64;
    let trace = LoopTrace {
        steps,
        outcome,
        total_duration_ms,
    };

    callback.on_loop_complete(&trace).await;

    info!(
        "Agentic loop finished: outcome={:?}, iterations={}, tool_calls={}, tokens={}, duration={}ms",
        outcome,
        iteration.min(config.max_iterations),
        tool_calls_made,
        total_usage.total_tokens,
        total_duration_ms,
    );

    Ok(AgentLoopOutput {
        response: final_response,
        trace,
        total_usage,
    })
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Answer a call past `max_tool_calls` without running it.
///
/// Every `tool_call_id` in a completion still needs a tool message.
fn refused_tool_call(tc: &AssistantToolCall) -> ToolAction {
    ToolAction {
        tool_name: tc.function.name.clone(),
        arguments: tc.function.arguments.clone(),
        observation: ToolObservation {
            success: false,
            content: TOOL_LIMIT_MESSAGE.to_string(),
            duration_ms: 0,
        },
    }
}

/// Execute one requested call; every failure becomes text for the model.
async fn execute_tool_call(tools: &ToolRegistry, tc: &AssistantToolCall) -> ToolAction {
    let tool_name = &tc.function.name;
    info!("Executing tool: {}", tool_name);
    debug!("Tool {} arguments: {}", tool_name, tc.function.arguments);

    let tool_start = Instant::now();
    let result = match serde_json::from_str::<serde_json::Value>(&tc.function.arguments) {
        Ok(arguments) => {
            let call = ToolCall {
                id: tc.id.clone(),
                name: tool_name.clone(),
                arguments,
            };
            tools.execute(&call).await
        }
        Err(e) => Err(Error::InvalidInput(format!(
            "Tool arguments are not valid JSON: {}",
            e
        ))),
    };
    let duration_ms = tool_start.elapsed().as_millis() as u64;

    let (success, content) = match result {
        Ok(r) => {
            let s = r.to_string();
            debug!("Tool {} result: {}", tool_name, preview(&s, 1000));
            (r.success, s)
        }
        Err(e) => {
            let err = format!("Tool error: {}", e);
            warn!("Tool {} failed: {}", tool_name, err);
            (false, err)
        }
    };

    ToolAction {
        tool_name: tool_name.clone(),
        arguments: tc.function.arguments.clone(),
        observation: ToolObservation {
            success,
            content,
            duration_ms,
        },
    }
}

/// At most `max` bytes of `s`, cut on a char boundary.
fn preview(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let end = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    &s[..end]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
