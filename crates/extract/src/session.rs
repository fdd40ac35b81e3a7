//! Caller-owned conversation history.
//!
//! One `SessionHistory` belongs to one session; it is created by whoever
//! starts the session and cleared or dropped when the session ends.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_MAX_TURNS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Keeps at most `max_turns` turns; older ones fall off the front.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl SessionHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
        }
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        if self.max_turns == 0 {
            return;
        }
        while self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn {
            role,
            content: content.into(),
        });
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Plain-text transcript for prompt injection.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|turn| match turn.role {
                Role::User => format!("user: {}", turn.content),
                Role::Assistant => format!("assistant: {}", turn.content),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_capped() {
        let mut history = SessionHistory::new(3);
        for i in 0..5 {
            history.push(Role::User, format!("m{i}"));
        }

        assert_eq!(history.len(), 3);
        let contents: Vec<_> = history.turns().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_render_and_clear() {
        let mut history = SessionHistory::default();
        history.push(Role::User, "小明在北京工作。");
        history.push(Role::Assistant, "[]");

        assert_eq!(history.render(), "user: 小明在北京工作。\nassistant: []");

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.render(), "");
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut history = SessionHistory::new(0);
        history.push(Role::User, "x");
        assert!(history.is_empty());
    }
}
