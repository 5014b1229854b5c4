use super::phrasing::Phraser;
use super::process::run_with_timeout;
use super::{Channel, VoiceBackend};
use anyhow::{bail, Context, Result};
use log::debug;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

const ELEVENLABS_TTS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const ELEVENLABS_MODEL: &str = "eleven_turbo_v2_5";
const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const OPENAI_TTS_MODEL: &str = "gpt-4o-mini-tts";
const OPENAI_VOICE: &str = "nova";

/// Speaks a short completion phrase rather than the whole summary.
pub struct VoiceChannel {
    client: Client,
    backend: VoiceBackend,
    phraser: Phraser,
    timeout: Duration,
}

impl VoiceChannel {
    pub fn new(client: Client, backend: VoiceBackend, phraser: Phraser, timeout: Duration) -> Self {
        Self {
            client,
            backend,
            phraser,
            timeout,
        }
    }

    /// Speak `text`, or a generated phrase when `text` is `None`.
    pub fn announce(&self, text: Option<&str>) -> Result<String> {
        let phrase = match text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t.to_string(),
            None => self.phraser.phrase(""),
        };
        self.speak(&phrase)?;
        Ok(phrase)
    }

    fn speak(&self, text: &str) -> Result<()> {
        debug!("speaking {text:?} via {}", backend_name(&self.backend));
        match &self.backend {
            VoiceBackend::ElevenLabs { api_key, voice_id } => {
                let request = self
                    .client
                    .post(format!("{ELEVENLABS_TTS_URL}/{voice_id}"))
                    .header("xi-api-key", api_key)
                    .header("accept", "audio/mpeg");
                let body = json!({ "text": text, "model_id": ELEVENLABS_MODEL });
                let audio = fetch_audio(request, &body).context("ElevenLabs synthesis")?;
                self.play(&audio)
            }
            VoiceBackend::OpenAi { api_key } => {
                let request = self
                    .client
                    .post(OPENAI_SPEECH_URL)
                    .header("Authorization", format!("Bearer {api_key}"));
                let body = json!({
                    "model": OPENAI_TTS_MODEL,
                    "voice": OPENAI_VOICE,
                    "input": text,
                    "response_format": "mp3",
                });
                let audio = fetch_audio(request, &body).context("OpenAI synthesis")?;
                self.play(&audio)
            }
            VoiceBackend::Local => run_with_timeout(local_speech_command(text), self.timeout),
        }
    }

    /// Write `audio` to a temporary mp3 and play it with the local player.
    fn play(&self, audio: &[u8]) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("hooknotify-")
            .suffix(".mp3")
            .tempfile()
            .context("creating temporary audio file")?;
        file.write_all(audio).context("writing temporary audio file")?;
        file.flush()?;
        run_with_timeout(player_command(file.path()), self.timeout)
    }
}

impl Channel for VoiceChannel {
    fn name(&self) -> &'static str {
        "voice"
    }

    fn deliver(&self, message: &str) -> Result<()> {
        let phrase = self.phraser.phrase(message);
        self.speak(&phrase)
    }
}

fn backend_name(backend: &VoiceBackend) -> &'static str {
    match backend {
        VoiceBackend::ElevenLabs { .. } => "elevenlabs",
        VoiceBackend::OpenAi { .. } => "openai",
        VoiceBackend::Local => "local",
    }
}

fn fetch_audio(request: RequestBuilder, body: &Value) -> Result<Vec<u8>> {
    let response = request.json(body).send().context("sending request")?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().unwrap_or_default();
        bail!("API returned {status}: {}", super::truncate(text.trim(), 300));
    }
    let bytes = response.bytes().context("reading audio")?;
    if bytes.is_empty() {
        bail!("API returned no audio");
    }
    Ok(bytes.to_vec())
}

fn local_speech_command(text: &str) -> Command {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("say")
    } else {
        Command::new("espeak")
    };
    cmd.arg(text);
    cmd
}

fn player_command(path: &Path) -> Command {
    if cfg!(target_os = "macos") {
        let mut cmd = Command::new("afplay");
        cmd.arg(path);
        cmd
    } else {
        let mut cmd = Command::new("ffplay");
        cmd.args(["-nodisp", "-autoexit", "-loglevel", "quiet"]).arg(path);
        cmd
    }
}
