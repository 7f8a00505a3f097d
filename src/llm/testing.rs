//! Scripted language model for orchestration tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use super::{AssistantTurn, ChatMessage, FunctionSpec, LanguageModel};

type CompleteFn = Box<dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync>;

/// Answers `complete` through a closure and `complete_with_tools` from a
/// queue of turns. Once the queue is empty, `fallback_turn` repeats (or the
/// call fails when there is none).
pub struct ScriptedModel {
    complete: CompleteFn,
    turns: Mutex<VecDeque<AssistantTurn>>,
    fallback_turn: Option<AssistantTurn>,
    pub complete_calls: AtomicUsize,
    pub tool_calls: AtomicUsize,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(complete: impl Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            complete: Box::new(complete),
            turns: Mutex::new(VecDeque::new()),
            fallback_turn: None,
            complete_calls: AtomicUsize::new(0),
            tool_calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A model whose plain completions always return `text`.
    pub fn replying(text: &'static str) -> Self {
        Self::new(move |_| Ok(text.to_string()))
    }

    pub fn with_turns(self, turns: Vec<AssistantTurn>) -> Self {
        *self.turns.lock().unwrap() = turns.into();
        self
    }

    pub fn with_fallback_turn(mut self, turn: AssistantTurn) -> Self {
        self.fallback_turn = Some(turn);
        self
    }

    pub fn completions(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn tool_rounds(&self) -> usize {
        self.tool_calls.load(Ordering::SeqCst)
    }
}

/// Text of the last user message in a prompt.
pub fn last_user_text(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == super::Role::User)
        .and_then(|m| m.content.as_deref())
        .unwrap_or_default()
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        (self.complete)(messages)
    }

    async fn complete_with_tools(
        &self,
        messages: &[ChatMessage],
        _functions: &[FunctionSpec],
    ) -> Result<AssistantTurn> {
        self.tool_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        let next = self.turns.lock().unwrap().pop_front();
        match next.or_else(|| self.fallback_turn.clone()) {
            Some(turn) => Ok(turn),
            None => anyhow::bail!("no scripted turn left"),
        }
    }
}
