use crate::history::ConversationHistory;
use crate::models::ChatMessage;

pub const SYSTEM_INSTRUCTIONS: &str = "You are a board-game rules assistant.\n\
Answer using ONLY the provided context excerpts.\n\
If the answer is not in the context, say you cannot find it in the rules excerpts.\n\
Be concise and precise.\n\
At the end, include a 'Sources:' line that cites the excerpt numbers you used, e.g. Sources: [1], [3].";

pub fn user_turn(question: &str, context: &str) -> String {
    format!("Question:\n{question}\n\nContext excerpts:\n{context}")
}

/// System instructions, then prior turns verbatim, then the new question
/// with its context excerpts.
pub fn build_messages(
    history: Option<&ConversationHistory>,
    question: &str,
    context: &str,
) -> Vec<ChatMessage> {
    let prior = history.map(ConversationHistory::messages).unwrap_or_default();
    let mut messages = Vec::with_capacity(prior.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_INSTRUCTIONS));
    messages.extend(prior);
    messages.push(ChatMessage::user(user_turn(question, context)));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn prompt_without_history_has_two_messages() {
        let messages = build_messages(None, "How many cards?", "[1] Source: a.pdf (p. 1)\nFive.");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, SYSTEM_INSTRUCTIONS);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(
            messages[1].content,
            "Question:\nHow many cards?\n\nContext excerpts:\n[1] Source: a.pdf (p. 1)\nFive."
        );
    }

    #[test]
    fn history_sits_between_system_and_question() {
        let mut history = ConversationHistory::new(5);
        history.record_turn("First?", "First answer.");
        let messages = build_messages(Some(&history), "Second?", "ctx");

        let roles: Vec<Role> = messages.iter().map(|message| message.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages[1].content, "First?");
        assert_eq!(messages[2].content, "First answer.");
        assert!(messages[3].content.starts_with("Question:\nSecond?"));
    }

    #[test]
    fn instructions_demand_grounding_and_citations() {
        assert!(SYSTEM_INSTRUCTIONS.contains("ONLY the provided context"));
        assert!(SYSTEM_INSTRUCTIONS.contains("cannot find it"));
        assert!(SYSTEM_INSTRUCTIONS.contains("Sources:"));
    }
}
