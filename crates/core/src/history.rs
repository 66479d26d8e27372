use crate::models::ChatMessage;
use std::collections::VecDeque;

/// Role-tagged turns of one interactive session, oldest first.
///
/// Holds at most `max_turns` question/answer pairs; recording a turn past the
/// cap evicts the oldest pair.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<(ChatMessage, ChatMessage)>,
    max_turns: usize,
}

impl ConversationHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: max_turns.max(1),
        }
    }

    /// Stores the bare question, not the question-plus-context prompt.
    pub fn record_turn(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        if self.turns.len() == self.max_turns {
            self.turns.pop_front();
        }
        self.turns
            .push_back((ChatMessage::user(question), ChatMessage::assistant(answer)));
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .flat_map(|(question, answer)| [question.clone(), answer.clone()])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::ConversationHistory;
    use crate::models::Role;

    #[test]
    fn turns_are_kept_in_order() {
        let mut history = ConversationHistory::new(3);
        history.record_turn("q1", "a1");
        history.record_turn("q2", "a2");

        let messages = history.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "q1");
        assert_eq!(messages[3].role, Role::Assistant);
        assert_eq!(messages[3].content, "a2");
    }

    #[test]
    fn oldest_turn_is_evicted_at_capacity() {
        let mut history = ConversationHistory::new(2);
        history.record_turn("q1", "a1");
        history.record_turn("q2", "a2");
        history.record_turn("q3", "a3");

        assert_eq!(history.len(), 2);
        let messages = history.messages();
        assert_eq!(messages[0].content, "q2");
        assert_eq!(messages[2].content, "q3");
    }

    #[test]
    fn new_history_is_empty() {
        let history = ConversationHistory::new(0);
        assert!(history.is_empty());
        assert!(history.messages().is_empty());
    }
}
