//! CLI channel for local interactive chat.
//!
//! Reads lines from stdin, hands them to the gateway, prints replies to
//! stdout. Every line is a direct message from the fixed local user.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::error::Result;

use super::{Channel, InboundMessage, MessageHandler, OutboundMessage};

/// Simple stdin/stdout channel for testing agents locally.
pub struct CliChannel {
    prompt: String,
    bot_name: String,
    running: AtomicBool,
}

impl CliChannel {
    /// Create a CLI channel with the default prompt and bot name.
    pub fn new() -> Self {
        Self {
            prompt: "You: ".to_string(),
            bot_name: "tabby".to_string(),
            running: AtomicBool::new(false),
        }
    }

    /// Override the input prompt and printed bot name.
    pub fn with_labels(mut self, prompt: &str, bot_name: &str) -> Self {
        self.prompt = prompt.to_string();
        self.bot_name = bot_name.to_string();
        self
    }

    fn show_prompt(&self) {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{}", self.prompt);
        let _ = stdout.flush();
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self, handler: MessageHandler) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        println!("[tabby] Type your message and press Enter. Ctrl+D to quit.\n");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        self.show_prompt();

        while self.running.load(Ordering::SeqCst) {
            let Some(line) = lines.next_line().await? else {
                // EOF
                break;
            };
            let text = line.trim();
            if text.is_empty() {
                self.show_prompt();
                continue;
            }

            let msg = InboundMessage::new(self.name(), "user", "local", text);
            handler(msg).await;
            self.show_prompt();
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("CLI channel stopped");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<bool> {
        println!("\n{}: {}\n", self.bot_name, msg.content);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_channel_name() {
        assert_eq!(CliChannel::new().name(), "cli");
    }

    #[tokio::test]
    async fn test_cli_channel_send() {
        let channel = CliChannel::new().with_labels("> ", "bot");
        let sent = channel
            .send(OutboundMessage::new("cli", "local", "hi"))
            .await
            .unwrap();
        assert!(sent);
    }

    #[tokio::test]
    async fn test_cli_channel_stop_flag() {
        let channel = CliChannel::new();
        channel.stop().await.unwrap();
        assert!(!channel.running.load(Ordering::SeqCst));
    }
}
