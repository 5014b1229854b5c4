use super::{truncate, PhrasingBackend};
use anyhow::{bail, Context, Result};
use log::{debug, warn};
use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::blocking::Client;
use serde_json::{json, Value};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_MODEL: &str = "gpt-4.1-nano";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";
const MAX_TOKENS: u32 = 60;

/// How much of the summary is shown to the model as context.
const CONTEXT_CHARS: usize = 600;

pub const CANNED_PHRASES: &[&str] = &[
    "Work complete!",
    "All done!",
    "Task finished!",
    "Job complete!",
    "Ready for next task!",
];

/// Produces the short sentence the voice channel speaks.
pub struct Phraser {
    client: Client,
    backend: PhrasingBackend,
    engineer_name: Option<String>,
}

impl Phraser {
    pub fn new(client: Client, backend: PhrasingBackend, engineer_name: Option<String>) -> Self {
        Self {
            client,
            backend,
            engineer_name,
        }
    }

    /// A completion announcement for a turn described by `context`. Falls
    /// back to the canned list when the model call fails.
    pub fn phrase(&self, context: &str) -> String {
        let generated = match &self.backend {
            PhrasingBackend::OpenAi { api_key } => self.openai(api_key, context),
            PhrasingBackend::Anthropic { api_key } => self.anthropic(api_key, context),
            PhrasingBackend::Canned => return self.canned(),
        };
        match generated {
            Ok(phrase) => phrase,
            Err(e) => {
                warn!("phrasing failed, using a canned phrase: {e:#}");
                self.canned()
            }
        }
    }

    /// Random pick from [`CANNED_PHRASES`], sometimes addressed to the
    /// engineer by name.
    pub fn canned(&self) -> String {
        let mut rng = rand::rng();
        let phrase = CANNED_PHRASES.choose(&mut rng).copied().unwrap_or("All done!");
        match &self.engineer_name {
            Some(name) if rng.random_bool(0.3) => format!("{name}, {}", lowercase_first(phrase)),
            _ => phrase.to_string(),
        }
    }

    fn instruction(&self, context: &str) -> String {
        let mut prompt = String::from(
            "Generate a short, friendly completion message (under 10 words) to be spoken \
             aloud when an AI coding assistant finishes a task. Be positive and vary the \
             wording. Return only the message, with no quotes or explanation.",
        );
        if let Some(name) = &self.engineer_name {
            prompt.push_str(&format!(
                " Sometimes address the engineer by name: {name}."
            ));
        }
        let context = context.trim();
        if !context.is_empty() {
            prompt.push_str("\n\nWhat was just done:\n");
            prompt.push_str(&truncate(context, CONTEXT_CHARS));
        }
        prompt
    }

    fn openai(&self, api_key: &str, context: &str) -> Result<String> {
        let body = json!({
            "model": OPENAI_MODEL,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": self.instruction(context) }],
        });
        debug!("phrasing with OpenAI {OPENAI_MODEL}");
        let data = post_json(
            self.client
                .post(OPENAI_CHAT_URL)
                .header("Authorization", format!("Bearer {api_key}")),
            &body,
        )?;
        clean(data["choices"][0]["message"]["content"].as_str())
            .context("OpenAI response has no message content")
    }

    fn anthropic(&self, api_key: &str, context: &str) -> Result<String> {
        let body = json!({
            "model": ANTHROPIC_MODEL,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": self.instruction(context) }],
        });
        debug!("phrasing with Anthropic {ANTHROPIC_MODEL}");
        let data = post_json(
            self.client
                .post(ANTHROPIC_MESSAGES_URL)
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01"),
            &body,
        )?;
        clean(data["content"][0]["text"].as_str())
            .context("Anthropic response has no text content")
    }
}

/// Send `body` as JSON and parse a JSON response, failing on non-2xx.
fn post_json(
    request: reqwest::blocking::RequestBuilder,
    body: &Value,
) -> Result<Value> {
    let response = request.json(body).send().context("sending request")?;
    let status = response.status();
    let text = response.text().context("reading response body")?;
    if !status.is_success() {
        bail!("API returned {status}: {}", truncate(text.trim(), 300));
    }
    serde_json::from_str(&text).context("parsing response JSON")
}

/// First line of a model reply with surrounding quotes stripped.
fn clean(raw: Option<&str>) -> Option<String> {
    let line = raw?.trim().lines().next()?.trim();
    let line = line.trim_matches(|c| c == '"' || c == '\'').trim();
    (!line.is_empty()).then(|| line.to_string())
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
