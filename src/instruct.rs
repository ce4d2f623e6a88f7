//! Llama-2 instruction markup: fold chat history into `<s>[INST] … [/INST] … </s>` blocks.
//! [https://huggingface.co/blog/llama2#how-to-prompt-llama-2]

use crate::protocol::{ChatMessage, Role};

pub const PAIR_START: &str = "<s>";
pub const PAIR_END: &str = "</s>";
pub const INST_START: &str = "[INST]";
pub const INST_END: &str = "[/INST]";
pub const SYS_START: &str = "<<SYS>>";
pub const SYS_END: &str = "<</SYS>>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileError {
    EmptyConversation,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::EmptyConversation => {
                write!(f, "cannot compile a prompt from an empty conversation")
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Content of one `<s>…</s>` block: at most one user message and the reply that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn<'a> {
    pub user: &'a str,
    pub bot: &'a str,
}

/// Merge runs of same-role messages, concatenating their contents without a separator.
pub fn normalize(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut runs: Vec<(Role, String)> = Vec::with_capacity(messages.len());
    for m in messages {
        match runs.last_mut() {
            Some((role, content)) if *role == m.role() => content.push_str(m.content()),
            _ => runs.push((m.role(), m.content().to_owned())),
        }
    }
    runs.into_iter()
        .map(|(role, content)| ChatMessage::new(role, content))
        .collect()
}

/// Walk a normalized history and pair each user message with the assistant reply after it.
/// A leading assistant message becomes a turn of its own with an empty user side.
pub fn pair_turns(messages: &[ChatMessage]) -> Vec<Turn<'_>> {
    let mut turns = Vec::with_capacity(messages.len());
    let mut i = 0;
    while i < messages.len() {
        let current = &messages[i];
        match current.role() {
            Role::Assistant => {
                turns.push(Turn {
                    user: "",
                    bot: current.content(),
                });
                i += 1;
            }
            Role::User => match messages.get(i + 1) {
                Some(next) if next.role() == Role::Assistant => {
                    turns.push(Turn {
                        user: current.content(),
                        bot: next.content(),
                    });
                    i += 2;
                }
                _ => {
                    turns.push(Turn {
                        user: current.content(),
                        bot: "",
                    });
                    i += 1;
                }
            },
        }
    }
    turns
}

/// Compile a chat history into a single prompt string.
/// The system prompt rides on the first block; a non-blank `suffix` adds a trailing instruction.
pub fn compile(
    messages: &[ChatMessage],
    system_prompt: &str,
    suffix: &str,
) -> Result<String, CompileError> {
    if messages.is_empty() {
        return Err(CompileError::EmptyConversation);
    }
    let normalized = normalize(messages);
    let turns = pair_turns(&normalized);
    Ok(templating::render_prompt(&turns, system_prompt, suffix))
}

pub mod templating;
