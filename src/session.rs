//! The chat bot: keeps the transcript, compiles prompts, and asks the backend for replies.
use eyre::Result;
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::inference::ModelBackend;
use crate::instruct;
use crate::prompting::{ALREADY_CONTINUED, MESSAGES_AFTER_THIS_ONE, NOTHING_TO_ACT_ON};
use crate::protocol::{ChatMessage, Role};
use crate::transcript::{ConversationProvider, Transcript};

/// What a bot action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new bot message was posted.
    Posted(String),
    /// The last bot message was replaced.
    Edited(String),
    /// The action was not possible; the text explains why.
    Refused(&'static str),
}

/// The latest bot response and whether it may still be continued.
#[derive(Debug, Clone)]
struct LastResponse {
    content: String,
    continued: bool,
}

pub struct ChatSession {
    config: SessionConfig,
    backend: Arc<dyn ModelBackend>,
    transcript: Transcript,
    last_response: Option<LastResponse>,
}

impl ChatSession {
    pub fn new(config: SessionConfig, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            config,
            backend,
            transcript: Transcript::new(),
            last_response: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Post the user's message and answer it.
    pub async fn reply(&mut self, user_text: &str) -> Result<Outcome> {
        self.transcript.push(ChatMessage::user(user_text));
        let messages = self
            .transcript
            .recent_messages(self.config.history_limit, 0)
            .await?;
        let text = self.generate(&messages, "").await?;
        self.transcript.push(ChatMessage::assistant(text.clone()));
        self.last_response = Some(LastResponse {
            content: text.clone(),
            continued: false,
        });
        Ok(Outcome::Posted(text))
    }

    /// Ask the model to keep going with its latest response. Allowed once per response,
    /// and only while that response is still the newest message.
    pub async fn continue_response(&mut self) -> Result<Outcome> {
        let Some(last) = self.last_response.as_ref() else {
            return Ok(Outcome::Refused(MESSAGES_AFTER_THIS_ONE));
        };
        if last.continued {
            return Ok(Outcome::Refused(ALREADY_CONTINUED));
        }

        let messages = self
            .transcript
            .recent_messages(self.config.history_limit, 0)
            .await?;
        if !is_latest_response(&messages, &last.content) {
            return Ok(Outcome::Refused(MESSAGES_AFTER_THIS_ONE));
        }

        let suffix = self.config.continue_suffix.clone();
        let text = self.generate(&messages, &suffix).await?;
        self.transcript.push(ChatMessage::assistant(text.clone()));
        self.last_response = Some(LastResponse {
            content: text.clone(),
            continued: true,
        });
        Ok(Outcome::Posted(text))
    }

    /// Regenerate the latest response from the history before it, replacing it in place.
    pub async fn rewrite_response(&mut self) -> Result<Outcome> {
        let Some(last) = self.last_response.as_ref() else {
            return Ok(Outcome::Refused(NOTHING_TO_ACT_ON));
        };
        if !is_latest_response(self.transcript.messages(), &last.content) {
            return Ok(Outcome::Refused(MESSAGES_AFTER_THIS_ONE));
        }

        let messages = self
            .transcript
            .recent_messages(self.config.history_limit, 1)
            .await?;
        let text = self.generate(&messages, "").await?;
        self.transcript
            .replace_last(ChatMessage::assistant(text.clone()));
        self.last_response = Some(LastResponse {
            content: text.clone(),
            continued: false,
        });
        Ok(Outcome::Edited(text))
    }

    async fn generate(&self, messages: &[ChatMessage], suffix: &str) -> Result<String> {
        let prompt = instruct::compile(messages, &self.config.system_prompt, suffix)?;
        tracing::debug!(
            backend = self.backend.name(),
            messages = messages.len(),
            prompt_len = prompt.len(),
            continuing = !suffix.is_empty(),
            "session: compiled prompt"
        );
        tracing::trace!(%prompt, "session: prompt text");

        let text = self.backend.generate(&prompt).await?;
        let text = text.trim().to_string();
        tracing::info!(reply_len = text.len(), "session: backend replied");
        Ok(text)
    }
}

fn is_latest_response(messages: &[ChatMessage], response: &str) -> bool {
    messages
        .last()
        .is_some_and(|m| m.role() == Role::Assistant && m.content() == response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::prompting::{CONTINUE_RESPONSE_SUFFIX, SYSTEM_PROMPT};
    use std::sync::Mutex;

    /// Replies from a fixed script and remembers every prompt it saw.
    struct Scripted {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ModelBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| eyre::eyre!("script exhausted"))
        }
    }

    fn config(history_limit: usize) -> SessionConfig {
        SessionConfig {
            system_prompt: SYSTEM_PROMPT.to_string(),
            continue_suffix: CONTINUE_RESPONSE_SUFFIX.to_string(),
            history_limit,
            backend: BackendConfig::Local { model_path: None },
        }
    }

    fn contents(session: &ChatSession) -> Vec<&str> {
        session
            .transcript()
            .messages()
            .iter()
            .map(ChatMessage::content)
            .collect()
    }

    #[tokio::test]
    async fn reply_compiles_history_and_records_answer() {
        let backend = Scripted::new(&["  Hi there!\n"]);
        let mut session = ChatSession::new(config(5), backend.clone());

        let out = session.reply("Hello").await.unwrap();
        assert_eq!(out, Outcome::Posted("Hi there!".into()));
        assert_eq!(contents(&session), ["Hello", "Hi there!"]);
        assert_eq!(
            backend.prompts(),
            [format!(
                "<s>[INST] <<SYS>>\n{SYSTEM_PROMPT}\n<</SYS>>\n\nHello [/INST]  </s>"
            )]
        );
    }

    #[tokio::test]
    async fn history_limit_bounds_the_prompt() {
        let backend = Scripted::new(&["a1", "a2", "a3"]);
        let mut session = ChatSession::new(config(3), backend.clone());
        session.reply("q1").await.unwrap();
        session.reply("q2").await.unwrap();
        session.reply("q3").await.unwrap();

        let last = backend.prompts().pop().unwrap();
        // window is [a1, q2, a2, ...] trimmed to the three newest: [q2, a2, q3]
        assert!(!last.contains("q1"));
        assert!(!last.contains("a1"));
        assert!(last.contains("q2 [/INST] a2"));
        assert!(last.ends_with("q3 [/INST]  </s>"));
    }

    #[tokio::test]
    async fn continue_appends_with_suffix_once() {
        let backend = Scripted::new(&["part one", "part two"]);
        let mut session = ChatSession::new(config(5), backend.clone());
        session.reply("tell me a story").await.unwrap();

        let out = session.continue_response().await.unwrap();
        assert_eq!(out, Outcome::Posted("part two".into()));
        assert_eq!(contents(&session), ["tell me a story", "part one", "part two"]);

        let prompt = backend.prompts().pop().unwrap();
        assert!(prompt.ends_with(&format!("<s>[INST] {CONTINUE_RESPONSE_SUFFIX} [/INST]</s>")));

        let again = session.continue_response().await.unwrap();
        assert_eq!(again, Outcome::Refused(ALREADY_CONTINUED));
        assert_eq!(backend.prompts().len(), 2);
    }

    #[tokio::test]
    async fn continue_merges_consecutive_bot_messages_next_turn() {
        let backend = Scripted::new(&["part one", "part two", "ok"]);
        let mut session = ChatSession::new(config(5), backend.clone());
        session.reply("story").await.unwrap();
        session.continue_response().await.unwrap();
        session.reply("thanks").await.unwrap();

        let prompt = backend.prompts().pop().unwrap();
        assert!(prompt.contains("story [/INST] part onepart two </s>"));
    }

    #[tokio::test]
    async fn rewrite_replaces_the_last_response() {
        let backend = Scripted::new(&["meh", "better"]);
        let mut session = ChatSession::new(config(5), backend.clone());
        session.reply("write a haiku").await.unwrap();

        let out = session.rewrite_response().await.unwrap();
        assert_eq!(out, Outcome::Edited("better".into()));
        assert_eq!(contents(&session), ["write a haiku", "better"]);

        // The rewrite prompt must not see the response it replaces.
        let prompt = backend.prompts().pop().unwrap();
        assert!(!prompt.contains("meh"));
        assert!(prompt.ends_with("write a haiku [/INST]  </s>"));
    }

    #[tokio::test]
    async fn rewritten_response_can_be_continued() {
        let backend = Scripted::new(&["one", "two", "three", "four"]);
        let mut session = ChatSession::new(config(5), backend.clone());
        session.reply("go").await.unwrap();
        session.continue_response().await.unwrap();
        session.rewrite_response().await.unwrap();
        let out = session.continue_response().await.unwrap();
        assert_eq!(out, Outcome::Posted("four".into()));
    }

    #[tokio::test]
    async fn refusals_before_first_reply() {
        let backend = Scripted::new(&[]);
        let mut session = ChatSession::new(config(5), backend.clone());
        assert_eq!(
            session.continue_response().await.unwrap(),
            Outcome::Refused(MESSAGES_AFTER_THIS_ONE)
        );
        assert_eq!(
            session.rewrite_response().await.unwrap(),
            Outcome::Refused(NOTHING_TO_ACT_ON)
        );
        assert!(backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_keeps_the_user_message() {
        let backend = Scripted::new(&[]);
        let mut session = ChatSession::new(config(5), backend);
        let err = session.reply("anyone?").await.unwrap_err();
        assert!(err.to_string().contains("script exhausted"));
        assert_eq!(contents(&session), ["anyone?"]);
    }

    #[tokio::test]
    async fn stale_response_cannot_be_continued() {
        let backend = Scripted::new(&["answer"]);
        let mut session = ChatSession::new(config(5), backend);
        session.reply("question").await.unwrap();
        // A failed reply leaves a user message after the response.
        assert!(session.reply("follow-up").await.is_err());
        assert_eq!(
            session.continue_response().await.unwrap(),
            Outcome::Refused(MESSAGES_AFTER_THIS_ONE)
        );
        assert_eq!(
            session.rewrite_response().await.unwrap(),
            Outcome::Refused(MESSAGES_AFTER_THIS_ONE)
        );
    }
}
