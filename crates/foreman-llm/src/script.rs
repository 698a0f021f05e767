//! Scripted thinkers for tests and offline runs
//!
//! These stand in for the model: a `ScriptedThinker` plays back a fixed
//! sequence of turns (or errors), a `RepeatThinker` returns the same turn on
//! every call. Both count invocations so tests can assert the loop budget.

use crate::thinker::{ThinkTurn, Thinker, ThinkerError, ToolDef};
use async_trait::async_trait;
use foreman_memory::EpisodicEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Plays back a fixed sequence of turns, then errors if called again
pub struct ScriptedThinker {
    turns: Mutex<VecDeque<Result<ThinkTurn, ThinkerError>>>,
    calls: AtomicUsize,
    /// History length seen on each call, for replay assertions
    history_lens: Mutex<Vec<usize>>,
}

impl ScriptedThinker {
    pub fn new(turns: Vec<Result<ThinkTurn, ThinkerError>>) -> Self {
        ScriptedThinker {
            turns: Mutex::new(turns.into()),
            calls: AtomicUsize::new(0),
            history_lens: Mutex::new(Vec::new()),
        }
    }

    /// Convenience constructor for all-success scripts
    pub fn from_turns(turns: Vec<ThinkTurn>) -> Self {
        Self::new(turns.into_iter().map(Ok).collect())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn history_lens(&self) -> Vec<usize> {
        self.history_lens.lock().await.clone()
    }
}

#[async_trait]
impl Thinker for ScriptedThinker {
    async fn think(
        &self,
        history: &[EpisodicEvent],
        _tools: &[ToolDef],
    ) -> Result<ThinkTurn, ThinkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.history_lens.lock().await.push(history.len());
        self.turns
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ThinkerError::Malformed("script exhausted".to_string())))
    }
}

/// Returns the same turn on every call (e.g. a model that never calls a tool)
pub struct RepeatThinker {
    turn: ThinkTurn,
    calls: AtomicUsize,
}

impl RepeatThinker {
    pub fn new(turn: ThinkTurn) -> Self {
        RepeatThinker {
            turn,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Thinker for RepeatThinker {
    async fn think(
        &self,
        _history: &[EpisodicEvent],
        _tools: &[ToolDef],
    ) -> Result<ThinkTurn, ThinkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.turn.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_thinker_plays_in_order() {
        let thinker = ScriptedThinker::from_turns(vec![
            ThinkTurn::thought("first"),
            ThinkTurn::call("final_answer", json!({"x": 1})),
        ]);

        let turn = thinker.think(&[], &[]).await.unwrap();
        assert_eq!(turn.thoughts, vec!["first".to_string()]);

        let turn = thinker.think(&[], &[]).await.unwrap();
        assert_eq!(turn.helper_call.unwrap().title, "final_answer");

        assert!(thinker.think(&[], &[]).await.is_err());
        assert_eq!(thinker.call_count(), 3);
    }

    #[tokio::test]
    async fn test_repeat_thinker_counts_calls() {
        let thinker = RepeatThinker::new(ThinkTurn::thought("t1"));
        for _ in 0..3 {
            let turn = thinker.think(&[], &[]).await.unwrap();
            assert!(turn.helper_call.is_none());
        }
        assert_eq!(thinker.call_count(), 3);
    }
}
