pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REVIEW_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";

pub const CHAT_SYSTEM_INSTRUCTION: &str = "You are a helpful research assistant discussing a specific paper with the user. \
The user has just uploaded this paper. You have access to its content. \
Answer questions specifically about the paper's content, methodology, results, and implications. \
Be precise. Quote sections if necessary.";

/// First seeded turn, sent alongside the document.
pub const CHAT_SEED_PROMPT: &str = "Here is the paper I would like to discuss.";
/// Seeded model acknowledgement that grounds the conversation.
pub const CHAT_SEED_ACKNOWLEDGEMENT: &str =
    "I have read the paper. What specific questions do you have about it?";

pub const ROLE_USER: &str = "user";
pub const ROLE_MODEL: &str = "model";
