//! Out-of-band delivery of turn summaries.
//!
//! Which backends are used is decided once per invocation from the
//! environment ([`ChannelConfig`]) and passed down; nothing below reads
//! environment variables on its own.

mod chat;
mod phrasing;
mod process;
mod voice;

pub use chat::{ChatError, TelegramChannel};
pub use phrasing::Phraser;
pub use voice::VoiceChannel;

use anyhow::{Context, Result};
use log::{info, warn};
use reqwest::blocking::Client;
use std::time::Duration;

// ===================================================================
// Environment-resolved channel configuration
// ===================================================================

pub const ELEVENLABS_API_KEY: &str = "ELEVENLABS_API_KEY";
pub const ELEVENLABS_VOICE_ID: &str = "ELEVENLABS_VOICE_ID";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENGINEER_NAME: &str = "ENGINEER_NAME";

const DEFAULT_ELEVENLABS_VOICE: &str = "WejK3H1m7MI9CHnIjW9K";

/// Speech synthesis backend, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceBackend {
    ElevenLabs { api_key: String, voice_id: String },
    OpenAi { api_key: String },
    /// `say` on macOS, `espeak` elsewhere. No network.
    Local,
}

/// Backend that phrases the spoken announcement, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhrasingBackend {
    OpenAi { api_key: String },
    Anthropic { api_key: String },
    /// Random pick from a fixed phrase list.
    Canned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub voice: VoiceBackend,
    pub phrasing: PhrasingBackend,
    /// `None` unless both the bot token and the chat id are set.
    pub telegram: Option<TelegramCredentials>,
    pub engineer_name: Option<String>,
}

impl ChannelConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration through `lookup`. Blank values count as
    /// unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let voice = if let Some(api_key) = get(ELEVENLABS_API_KEY) {
            VoiceBackend::ElevenLabs {
                api_key,
                voice_id: get(ELEVENLABS_VOICE_ID)
                    .unwrap_or_else(|| DEFAULT_ELEVENLABS_VOICE.into()),
            }
        } else if let Some(api_key) = get(OPENAI_API_KEY) {
            VoiceBackend::OpenAi { api_key }
        } else {
            VoiceBackend::Local
        };

        let phrasing = if let Some(api_key) = get(OPENAI_API_KEY) {
            PhrasingBackend::OpenAi { api_key }
        } else if let Some(api_key) = get(ANTHROPIC_API_KEY) {
            PhrasingBackend::Anthropic { api_key }
        } else {
            PhrasingBackend::Canned
        };

        let telegram = match (get(TELEGRAM_BOT_TOKEN), get(TELEGRAM_CHAT_ID)) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramCredentials { bot_token, chat_id }),
            _ => None,
        };

        Self {
            voice,
            phrasing,
            telegram,
            engineer_name: get(ENGINEER_NAME),
        }
    }
}

/// Blocking HTTP client shared by all channels of one invocation.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("building HTTP client")
}

// ===================================================================
// Dispatcher
// ===================================================================

/// A delivery channel for the assembled summary.
pub trait Channel {
    fn name(&self) -> &'static str;
    fn deliver(&self, message: &str) -> Result<()>;
}

/// Deliver `message` on every channel independently. Failures are logged
/// and swallowed; returns how many channels succeeded.
pub fn dispatch(channels: &[Box<dyn Channel>], message: &str) -> usize {
    let mut delivered = 0;
    for channel in channels {
        match channel.deliver(message) {
            Ok(()) => {
                info!("delivered via {}", channel.name());
                delivered += 1;
            }
            Err(e) => warn!("{} delivery failed: {e:#}", channel.name()),
        }
    }
    delivered
}

/// Truncate a string to `max` chars, appending "..." if truncated.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
    }
}
