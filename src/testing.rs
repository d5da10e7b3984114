//! In-process fakes for the model and the database.
//!
//! Provides:
//! - [`ScriptedModel`]: a [`ChatModel`] that replays queued completions and
//!   records every request it receives
//! - [`InMemoryGateway`]: a [`DatabaseGateway`] with scripted query results
//!   and a fixed catalog, recording every SQL string it is given
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aidb::testing::{InMemoryGateway, ScriptedModel};
//! use aidb::agent::DatabaseAssistant;
//!
//! # async fn demo() -> aidb::Result<()> {
//! let model = Arc::new(ScriptedModel::new().with_reply("Done."));
//! let gateway = Arc::new(InMemoryGateway::new());
//! let mut assistant = DatabaseAssistant::with_model(&Default::default(), model, gateway)?;
//! assert_eq!(assistant.run_agent("hello").await?, "Done.");
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::{
    AssistantToolCall, ChatCompletionResponse, ChatModel, Choice, GenerationOptions, Message,
    ToolDefinition, Usage,
};
use crate::database::{ColumnInfo, DatabaseGateway, QueryResult, QueryRows};
use crate::error::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One request received by [`ScriptedModel`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    /// Tools offered; empty when the loop withheld them
    pub tools: Vec<ToolDefinition>,
    pub options: GenerationOptions,
}

/// A chat model that answers from a script.
///
/// Each call pops the next queued completion. Running past the end of the
/// script is an `Error::Provider`.
pub struct ScriptedModel {
    model_name: String,
    script: Mutex<VecDeque<Result<ChatCompletionResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    next_call_id: AtomicU32,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            model_name: "scripted-model".to_string(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            next_call_id: AtomicU32::new(1),
        }
    }

    /// Queue a plain-text answer.
    pub fn with_reply(self, content: impl Into<String>) -> Self {
        self.with_response(completion(Message::assistant(content), "stop"))
    }

    /// Queue a single tool call with JSON arguments.
    pub fn with_tool_call(self, name: &str, arguments: Value) -> Self {
        self.with_tool_calls(&[(name, arguments)])
    }

    /// Queue several tool calls requested in one completion.
    pub fn with_tool_calls(self, calls: &[(&str, Value)]) -> Self {
        let calls = calls
            .iter()
            .map(|(name, arguments)| AssistantToolCall::function(self.call_id(), *name, arguments))
            .collect();
        self.with_response(completion(Message::assistant_tool_calls("", calls), "tool_calls"))
    }

    /// Queue a tool call whose argument string is passed through verbatim.
    pub fn with_raw_tool_call(self, name: &str, arguments: &str) -> Self {
        let mut call = AssistantToolCall::function(self.call_id(), name, &Value::Null);
        call.function.arguments = arguments.to_string();
        self.with_response(completion(
            Message::assistant_tool_calls("", vec![call]),
            "tool_calls",
        ))
    }

    /// Queue a provider failure.
    pub fn with_error(self, error: Error) -> Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    /// Queue an arbitrary completion.
    pub fn with_response(self, response: ChatCompletionResponse) -> Self {
        lock(&self.script).push_back(Ok(response));
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Completions not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }

    fn call_id(&self) -> String {
        format!("call_{}", self.next_call_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

fn completion(message: Message, finish_reason: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: "chatcmpl-scripted".to_string(),
        model: "scripted-model".to_string(),
        choices: vec![Choice {
            index: 0,
            message,
            finish_reason: Some(finish_reason.to_string()),
        }],
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        options: GenerationOptions,
    ) -> Result<ChatCompletionResponse> {
        lock(&self.requests).push(RecordedRequest {
            messages,
            tools,
            options,
        });

        lock(&self.script).pop_front().unwrap_or_else(|| {
            Err(Error::Provider(
                "ScriptedModel has no more responses".to_string(),
            ))
        })
    }
}

/// A database gateway backed by plain data.
///
/// `run_query` answers from a queue of scripted results and falls back to an
/// empty row set; the catalog is whatever was registered with `with_table`.
pub struct InMemoryGateway {
    tables: Vec<(String, Vec<String>)>,
    results: Mutex<VecDeque<QueryResult>>,
    executed: Mutex<Vec<String>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            results: Mutex::new(VecDeque::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Register a table and its columns, in ordinal order.
    pub fn with_table(mut self, name: &str, columns: &[&str]) -> Self {
        self.tables.push((
            name.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Register several tables at once.
    pub fn with_tables(self, tables: &[(&str, &[&str])]) -> Self {
        tables
            .iter()
            .fold(self, |gateway, (name, columns)| gateway.with_table(name, columns))
    }

    /// Queue the result of the next `run_query`.
    pub fn with_result(self, result: QueryResult) -> Self {
        lock(&self.results).push_back(result);
        self
    }

    /// SQL passed to `run_query`, in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseGateway for InMemoryGateway {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn run_query(&self, sql: &str) -> QueryResult {
        lock(&self.executed).push(sql.to_string());
        lock(&self.results)
            .pop_front()
            .unwrap_or_else(|| QueryResult::Rows(QueryRows::default()))
    }

    async fn describe_tables(&self, table_names: &[String]) -> Result<Vec<ColumnInfo>> {
        let mut matching: Vec<&(String, Vec<String>)> = self
            .tables
            .iter()
            .filter(|(name, _)| table_names.contains(name))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(matching
            .into_iter()
            .flat_map(|(table, columns)| {
                columns.iter().map(move |column| ColumnInfo {
                    table_name: table.clone(),
                    column_name: column.clone(),
                })
            })
            .collect())
    }
}
