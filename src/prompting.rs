//! What we tell the model, and what we tell the user when we refuse.

/// The instruction that primes the assistant with its persona.
pub const SYSTEM_PROMPT: &str = "You are a helpful, respectful and honest assistant.";

/// Trailing instruction used when the user asks to continue the last response.
pub const CONTINUE_RESPONSE_SUFFIX: &str =
    "This is a conversation you were having. Please continue your response.";

/// Shown when the response to continue is no longer the latest message.
pub const MESSAGES_AFTER_THIS_ONE: &str =
    "There has already been messages after this one. You cannot continue the response.";

/// Shown when the response to continue has already been continued once.
pub const ALREADY_CONTINUED: &str = "This response has already been continued.";

/// Shown when there is no response to rewrite yet.
pub const NOTHING_TO_ACT_ON: &str = "There is no response yet. Say something first.";
