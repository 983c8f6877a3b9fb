//! Context window management for interview requests.
//!
//! Projects a conversation's turn log into the bounded set of messages
//! actually sent to the provider. The leading system turn is pinned and
//! never evicted; everything else lives in `recent` and is trimmed
//! oldest-first, two at a time, so user/assistant exchanges stay aligned.

use serde::{Deserialize, Serialize};

use super::turn::{Turn, TurnRole};

/// Characters assumed per token by the cheap size estimate.
pub const CHARS_PER_TOKEN: usize = 4;

/// Default estimated-token budget for a window.
pub const DEFAULT_MAX_TOKENS: usize = 4000;

/// Default message budget for a window (pinned turn excluded).
pub const DEFAULT_MAX_MESSAGES: usize = 50;

/// A role/content pair in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: TurnRole,
    pub content: String,
}

impl ContextMessage {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(TurnRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

impl From<&Turn> for ContextMessage {
    fn from(turn: &Turn) -> Self {
        Self::new(turn.role(), turn.content())
    }
}

/// Size limits for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBudget {
    /// Ceiling on the estimated token count of pinned + recent.
    pub max_tokens: usize,
    /// Ceiling on the number of entries in `recent`.
    pub max_messages: usize,
}

impl WindowBudget {
    pub fn new(max_tokens: usize, max_messages: usize) -> Self {
        Self {
            max_tokens,
            max_messages,
        }
    }

    /// A budget half the size of this one, used after a context-length rejection.
    ///
    /// Never drops below one exchange.
    pub fn halved(&self) -> Self {
        Self {
            max_tokens: (self.max_tokens / 2).max(1),
            max_messages: (self.max_messages / 2).max(2),
        }
    }
}

impl Default for WindowBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS, DEFAULT_MAX_MESSAGES)
    }
}

/// Snapshot of a window's size, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowSummary {
    pub message_count: usize,
    pub estimated_tokens: usize,
    pub has_pinned: bool,
    pub max_tokens: usize,
    pub max_messages: usize,
}

/// Bounded projection of a turn history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationWindow {
    pinned: Option<ContextMessage>,
    recent: Vec<ContextMessage>,
    budget: WindowBudget,
}

impl ConversationWindow {
    /// Creates an empty window.
    pub fn new(budget: WindowBudget) -> Self {
        Self {
            pinned: None,
            recent: Vec::new(),
            budget,
        }
    }

    /// Builds a window from an optional pinned candidate followed by a history.
    ///
    /// The first system turn encountered (the candidate included) becomes the
    /// pinned turn. Every other turn is appended in order, trimming after each.
    pub fn build<I>(pinned_candidate: Option<ContextMessage>, history: I, budget: WindowBudget) -> Self
    where
        I: IntoIterator<Item = ContextMessage>,
    {
        let mut window = Self::new(budget);
        for message in pinned_candidate.into_iter().chain(history) {
            window.push(message);
        }
        window.trim();
        window
    }

    /// Builds a window straight from stored turns.
    pub fn from_turns<'a, I>(turns: I, budget: WindowBudget) -> Self
    where
        I: IntoIterator<Item = &'a Turn>,
    {
        Self::build(None, turns.into_iter().map(ContextMessage::from), budget)
    }

    /// Appends a message and re-applies the budget.
    pub fn push(&mut self, message: ContextMessage) {
        if message.role == TurnRole::System && self.pinned.is_none() {
            self.pinned = Some(message);
        } else {
            self.recent.push(message);
        }
        self.trim();
    }

    /// Wire-ready messages: pinned first, then recent in order.
    ///
    /// Pure function of the current state.
    pub fn render(&self) -> Vec<ContextMessage> {
        self.pinned
            .iter()
            .chain(self.recent.iter())
            .cloned()
            .collect()
    }

    /// Estimated tokens of everything included: total characters / 4, floored.
    pub fn estimated_tokens(&self) -> usize {
        let chars: usize = self
            .pinned
            .iter()
            .chain(self.recent.iter())
            .map(ContextMessage::char_count)
            .sum();
        chars / CHARS_PER_TOKEN
    }

    pub fn pinned(&self) -> Option<&ContextMessage> {
        self.pinned.as_ref()
    }

    pub fn recent(&self) -> &[ContextMessage] {
        &self.recent
    }

    pub fn budget(&self) -> WindowBudget {
        self.budget
    }

    /// Number of non-pinned messages.
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Drops every non-pinned message.
    pub fn clear(&mut self) {
        self.recent.clear();
    }

    pub fn summary(&self) -> WindowSummary {
        WindowSummary {
            message_count: self.recent.len(),
            estimated_tokens: self.estimated_tokens(),
            has_pinned: self.pinned.is_some(),
            max_tokens: self.budget.max_tokens,
            max_messages: self.budget.max_messages,
        }
    }

    fn trim(&mut self) {
        while self.recent.len() > self.budget.max_messages {
            self.remove_oldest_pair();
        }

        while self.estimated_tokens() > self.budget.max_tokens && self.recent.len() > 2 {
            self.remove_oldest_pair();
        }
    }

    fn remove_oldest_pair(&mut self) {
        let n = self.recent.len().min(2);
        self.recent.drain(..n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(n: usize) -> Vec<ContextMessage> {
        (0..n)
            .flat_map(|i| {
                [
                    ContextMessage::user(format!("answer {}", i)),
                    ContextMessage::assistant(format!("question {}", i)),
                ]
            })
            .collect()
    }

    mod construction {
        use super::*;

        #[test]
        fn first_system_turn_is_pinned() {
            let window = ConversationWindow::build(
                Some(ContextMessage::system("instructions")),
                exchange(2),
                WindowBudget::default(),
            );

            assert_eq!(window.pinned().unwrap().content, "instructions");
            assert_eq!(window.len(), 4);
        }

        #[test]
        fn later_system_turns_go_to_recent() {
            let history = vec![
                ContextMessage::system("first"),
                ContextMessage::user("hi"),
                ContextMessage::system("second"),
            ];
            let window = ConversationWindow::build(None, history, WindowBudget::default());

            assert_eq!(window.pinned().unwrap().content, "first");
            assert_eq!(window.recent()[1].role, TurnRole::System);
            assert_eq!(window.recent()[1].content, "second");
        }

        #[test]
        fn window_without_system_turn_has_no_pin() {
            let window = ConversationWindow::build(None, exchange(1), WindowBudget::default());
            assert!(window.pinned().is_none());
            assert_eq!(window.render().len(), 2);
        }

        #[test]
        fn from_turns_preserves_order() {
            let turns = vec![Turn::system("sys"), Turn::assistant("hello"), Turn::user("hi")];
            let window = ConversationWindow::from_turns(&turns, WindowBudget::default());
            let rendered = window.render();

            assert_eq!(rendered[0], ContextMessage::system("sys"));
            assert_eq!(rendered[1], ContextMessage::assistant("hello"));
            assert_eq!(rendered[2], ContextMessage::user("hi"));
        }
    }

    mod trimming {
        use super::*;

        #[test]
        fn message_budget_evicts_oldest_pairs() {
            let window = ConversationWindow::build(
                Some(ContextMessage::system("sys")),
                exchange(5),
                WindowBudget::new(10_000, 4),
            );

            assert_eq!(window.len(), 4);
            assert_eq!(window.recent()[0].content, "answer 3");
            assert_eq!(window.pinned().unwrap().content, "sys");
        }

        #[test]
        fn token_budget_keeps_at_least_two_messages() {
            let long = "x".repeat(400);
            let history = vec![
                ContextMessage::user(long.clone()),
                ContextMessage::assistant(long.clone()),
                ContextMessage::user(long.clone()),
                ContextMessage::assistant(long),
            ];
            let window = ConversationWindow::build(None, history, WindowBudget::new(10, 50));

            assert_eq!(window.len(), 2);
            assert!(window.estimated_tokens() > 10);
        }

        #[test]
        fn token_estimate_counts_characters_not_bytes() {
            let window = ConversationWindow::build(
                None,
                vec![ContextMessage::user("çãéíóú")],
                WindowBudget::default(),
            );
            // 6 characters, 12 bytes
            assert_eq!(window.estimated_tokens(), 1);
        }

        #[test]
        fn zero_message_budget_clears_lone_message() {
            let mut window = ConversationWindow::new(WindowBudget::new(100, 0));
            window.push(ContextMessage::user("hi"));
            assert!(window.is_empty());
        }

        #[test]
        fn push_retrims() {
            let mut window = ConversationWindow::build(
                Some(ContextMessage::system("sys")),
                exchange(1),
                WindowBudget::new(10_000, 2),
            );
            window.push(ContextMessage::user("new answer"));

            assert_eq!(window.len(), 1);
            assert_eq!(window.recent()[0].content, "new answer");
        }

        #[test]
        fn clear_keeps_pinned() {
            let mut window = ConversationWindow::build(
                Some(ContextMessage::system("sys")),
                exchange(3),
                WindowBudget::default(),
            );
            window.clear();

            assert!(window.is_empty());
            assert!(window.pinned().is_some());
        }

        #[test]
        fn halved_budget_never_collapses() {
            let budget = WindowBudget::new(3, 3).halved();
            assert_eq!(budget.max_tokens, 1);
            assert_eq!(budget.max_messages, 2);
        }
    }

    mod summary {
        use super::*;

        #[test]
        fn summary_reports_budget_and_size() {
            let window = ConversationWindow::build(
                Some(ContextMessage::system("abcd")),
                vec![ContextMessage::user("efgh")],
                WindowBudget::new(4000, 50),
            );
            let summary = window.summary();

            assert_eq!(summary.message_count, 1);
            assert_eq!(summary.estimated_tokens, 2);
            assert!(summary.has_pinned);
            assert_eq!(summary.max_tokens, 4000);
            assert_eq!(summary.max_messages, 50);
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_message() -> impl Strategy<Value = ContextMessage> {
            (prop_oneof![Just(TurnRole::User), Just(TurnRole::Assistant)], ".{0,80}")
                .prop_map(|(role, content)| ContextMessage::new(role, content))
        }

        proptest! {
            #[test]
            fn recent_never_exceeds_message_budget(
                history in proptest::collection::vec(arb_message(), 0..60),
                max_messages in 1usize..20,
                max_tokens in 1usize..500,
            ) {
                let window = ConversationWindow::build(
                    Some(ContextMessage::system("pinned")),
                    history,
                    WindowBudget::new(max_tokens, max_messages),
                );
                prop_assert!(window.len() <= max_messages);
                prop_assert_eq!(window.pinned().map(|m| m.content.as_str()), Some("pinned"));
            }

            #[test]
            fn token_budget_holds_unless_floor_reached(
                history in proptest::collection::vec(arb_message(), 0..60),
                max_tokens in 1usize..200,
            ) {
                let window = ConversationWindow::build(None, history, WindowBudget::new(max_tokens, 50));
                prop_assert!(window.estimated_tokens() <= max_tokens || window.len() <= 2);
            }

            #[test]
            fn each_push_evicts_in_pairs(
                history in proptest::collection::vec(arb_message(), 1..40),
                max_messages in 1usize..10,
            ) {
                let mut window = ConversationWindow::new(WindowBudget::new(usize::MAX, max_messages));
                for message in history {
                    let before = window.len();
                    window.push(message);
                    let after = window.len();
                    // Growth by one, or shrink by an odd count (one added, pairs removed).
                    prop_assert!(after == before + 1 || (before + 1 - after) % 2 == 0);
                }
            }

            #[test]
            fn render_is_idempotent(
                history in proptest::collection::vec(arb_message(), 0..30),
            ) {
                let window = ConversationWindow::build(
                    Some(ContextMessage::system("sys")),
                    history,
                    WindowBudget::new(300, 10),
                );
                prop_assert_eq!(window.render(), window.render());
            }
        }
    }
}
