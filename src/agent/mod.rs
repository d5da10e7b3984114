//! Agent module - chat model client, conversation memory, and the tool loop
//!
//! - client.rs: `ChatModel` trait and the OpenAI chat completions client
//! - agentic_loop.rs: call model, run requested tools, repeat
//! - assistant.rs: `DatabaseAssistant`, one turn at a time with memory
//! - memory.rs: human/AI history and its retention policy
//! - prompts.rs: the system instruction template

pub mod agentic_loop;
mod assistant;
mod client;
pub mod memory;
pub mod prompts;
pub mod types;

pub use agentic_loop::{
    run_agentic_loop, AgentLoopInput, AgentLoopOutput, LoopCallback, LoopConfig, LoopOutcome,
    LoopStep, LoopTrace, NoOpCallback, ToolAction, ToolObservation,
};
pub use assistant::{DatabaseAssistant, TurnReport};
pub use client::{ChatModel, OpenAiClient};
pub use memory::{ConversationMemory, MemoryPolicy, Turn};
pub use prompts::{PromptTemplate, DEFAULT_SYSTEM_PROMPT, GREETING};
pub use types::*;
