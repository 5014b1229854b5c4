use super::{truncate, Channel, TelegramCredentials};
use anyhow::Result;
use reqwest::blocking::Client;
use reqwest::StatusCode;

/// Telegram rejects messages longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Why a Telegram message was not delivered.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The request never got an answer. The URL, which embeds the bot
    /// token, is stripped from the source.
    #[error("sending Telegram message")]
    Transport(#[source] reqwest::Error),
    #[error("Telegram API returned {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Posts summaries to a Telegram chat through the Bot API.
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    credentials: TelegramCredentials,
}

impl TelegramChannel {
    pub fn new(client: Client, api_base: &str, credentials: TelegramCredentials) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.credentials.bot_token)
    }
}

impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn deliver(&self, message: &str) -> Result<()> {
        // Leave room for the "..." suffix.
        let text = truncate(message, MAX_MESSAGE_CHARS - 3);
        let response = self
            .client
            .post(self.endpoint())
            .form(&[
                ("chat_id", self.credentials.chat_id.as_str()),
                ("text", text.as_str()),
                ("parse_mode", "Markdown"),
            ])
            .send()
            .map_err(|e| ChatError::Transport(e.without_url()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().unwrap_or_default();
            return Err(ChatError::Rejected {
                status,
                body: body.trim().to_string(),
            }
            .into());
        }
        Ok(())
    }
}
