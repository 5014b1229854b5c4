use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

// ===================================================================
// Transcript record: one per JSONL line
// ===================================================================

/// A single line in a Claude Code `.jsonl` transcript file.
///
/// Only the fields the notifier needs are modelled and all of them are
/// optional, so `progress`, `system` and snapshot entries parse too; they
/// just never match a reply or a prompt.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRecord {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub parent_uuid: Option<String>,
    #[serde(default, rename = "type")]
    pub record_type: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// `message.content` can be a plain string (user text) or an array of
/// content blocks (assistant responses, tool results).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
    /// Anything else; never treated as text.
    Other(serde_json::Value),
}

/// A content block. Only `type` and `text` are read; `tool_use`,
/// `tool_result` and `thinking` blocks keep their other fields unparsed.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(default, rename = "type")]
    pub block_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// `Some(trimmed)` unless the value is absent, empty or whitespace-only.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

impl TranscriptRecord {
    fn role(&self) -> Option<&str> {
        self.message.as_ref().and_then(|m| m.role.as_deref())
    }

    pub fn is_assistant_reply(&self) -> bool {
        self.role() == Some("assistant")
    }

    /// A prompt the user actually typed: tagged `user`, role `user`, and
    /// plain string content. Tool results are also tagged `user` but carry
    /// an array of `tool_result` blocks.
    pub fn is_user_prompt(&self) -> bool {
        self.record_type.as_deref() == Some("user")
            && self.role() == Some("user")
            && self.prompt_text().is_some()
    }

    /// The string content of this record, if its content is a plain string.
    pub fn prompt_text(&self) -> Option<&str> {
        match self.message.as_ref()?.content.as_ref()? {
            MessageContent::Text(t) => Some(t),
            _ => None,
        }
    }

    /// The first text-typed block of the content. Only block arrays are
    /// scanned; plain string content has no blocks.
    fn first_text(&self) -> Option<&str> {
        match self.message.as_ref()?.content.as_ref()? {
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .find(|b| b.block_type.as_deref() == Some("text"))
                .and_then(|b| b.text.as_deref()),
            MessageContent::Text(_) | MessageContent::Other(_) => None,
        }
    }
}

/// `path` with a leading `~` replaced by the home directory. Hook payloads
/// may carry `~/.claude/projects/...`; other paths are returned as given.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') || rest.starts_with(std::path::MAIN_SEPARATOR) => {
            &rest[1..]
        }
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

// ===================================================================
// LatestReplyLocator
// ===================================================================

/// Normalized view of the most recent assistant record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedReply {
    pub model: Option<String>,
    pub text: Option<String>,
    /// Empty when the record had no parent.
    pub parent_uuid: String,
}

impl From<&TranscriptRecord> for NormalizedReply {
    fn from(record: &TranscriptRecord) -> Self {
        Self {
            model: non_blank(record.message.as_ref().and_then(|m| m.model.as_deref())),
            text: non_blank(record.first_text()),
            parent_uuid: record.parent_uuid.clone().unwrap_or_default(),
        }
    }
}

/// Why no reply could be located. Never fatal: callers drop the
/// reply-derived sections and carry on.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReplyNotFound {
    #[error("transcript {0} does not exist")]
    MissingFile(String),
    #[error("transcript could not be read: {0}")]
    Unreadable(String),
    #[error("transcript is empty")]
    Empty,
    #[error("transcript has no valid JSON lines")]
    NoValidLines,
    #[error("transcript has no assistant message")]
    NoAssistant,
}

/// Find the most recent assistant record in the transcript at `path`.
pub fn locate_latest_reply(path: &Path) -> Result<NormalizedReply, ReplyNotFound> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ReplyNotFound::MissingFile(path.display().to_string()));
        }
        Err(e) => return Err(ReplyNotFound::Unreadable(e.to_string())),
    };
    latest_reply(&contents)
}

/// Scan JSONL `contents` from the last line backwards and return the first
/// assistant record. Lines are parsed lazily, so the common case (reply
/// near the end) touches only the tail of the file.
pub fn latest_reply(contents: &str) -> Result<NormalizedReply, ReplyNotFound> {
    let mut saw_line = false;
    let mut saw_record = false;

    for line in contents.lines().rev() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        saw_line = true;
        let record: TranscriptRecord = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(_) => continue,
        };
        saw_record = true;
        if record.is_assistant_reply() {
            return Ok(NormalizedReply::from(&record));
        }
    }

    Err(if !saw_line {
        ReplyNotFound::Empty
    } else if !saw_record {
        ReplyNotFound::NoValidLines
    } else {
        ReplyNotFound::NoAssistant
    })
}

// ===================================================================
// Transcript: parsed JSONL records in append order with a UUID index
// ===================================================================

/// A parsed Claude Code JSONL transcript.
pub struct Transcript {
    records: Vec<TranscriptRecord>,
    by_uuid: HashMap<String, usize>, // uuid → index into records
}

impl Transcript {
    /// An empty transcript (no records).
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            by_uuid: HashMap::new(),
        }
    }

    /// Parse a JSONL transcript string. Returns the transcript and any
    /// lines that failed to parse (with 1-based line number and error).
    pub fn parse(contents: &str) -> (Self, Vec<(usize, String)>) {
        let mut records = Vec::new();
        let mut errors = Vec::new();
        let mut by_uuid = HashMap::new();

        for (i, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<TranscriptRecord>(line) {
                Ok(record) => {
                    if let Some(uuid) = &record.uuid {
                        by_uuid.insert(uuid.clone(), records.len());
                    }
                    records.push(record);
                }
                Err(e) => errors.push((i + 1, format!("{e}"))),
            }
        }

        (Self { records, by_uuid }, errors)
    }

    /// Read and parse the transcript at `path`. A missing file is an empty
    /// transcript; malformed lines are logged and skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::empty()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading transcript {}", path.display()));
            }
        };
        let (transcript, errors) = Self::parse(&contents);
        for (line, err) in &errors {
            debug!("skipping transcript line {line}: {err}");
        }
        debug!("loaded {} records from {}", transcript.len(), path.display());
        Ok(transcript)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Look up a record by UUID. With duplicate UUIDs the latest one wins.
    pub fn get(&self, uuid: &str) -> Option<&TranscriptRecord> {
        self.by_uuid.get(uuid).map(|&i| &self.records[i])
    }

    // ---------------------------------------------------------------
    // Chain walking
    // ---------------------------------------------------------------

    /// Walk `parentUuid` links from `start` and return the first record on
    /// the chain (including `start` itself) that satisfies `predicate`.
    ///
    /// This is a single backward pass over the records: whenever the record
    /// currently sought is met and rejected, the sought UUID moves to its
    /// parent. The pass is bounded by the number of records, so malformed
    /// cycles cannot loop. Parents normally precede their children in a
    /// transcript; a parent appended after its child is not found.
    pub fn find_ancestor<'a, P>(&'a self, start: &'a str, mut predicate: P) -> Option<&'a TranscriptRecord>
    where
        P: FnMut(&TranscriptRecord) -> bool,
    {
        if start.is_empty() {
            return None;
        }
        let mut sought = start;
        for record in self.records.iter().rev() {
            if record.uuid.as_deref() != Some(sought) {
                continue;
            }
            if predicate(record) {
                return Some(record);
            }
            match record.parent_uuid.as_deref() {
                Some(parent) if !parent.is_empty() => sought = parent,
                _ => return None,
            }
        }
        None
    }

    /// The user prompt that started the chain ending at `start`, trimmed.
    pub fn find_user_prompt(&self, start: &str) -> Option<String> {
        self.find_ancestor(start, TranscriptRecord::is_user_prompt)
            .and_then(TranscriptRecord::prompt_text)
            .map(|t| t.trim().to_string())
    }
}

// ===================================================================
// PromptRecoverer
// ===================================================================

/// Recover the user prompt behind a reply whose parent is `parent_uuid`,
/// reading the transcript at `path` afresh. Unreadable transcripts and
/// broken chains both come back as `None`.
pub fn recover_prompt(path: &Path, parent_uuid: &str) -> Option<String> {
    let transcript = match Transcript::load(path) {
        Ok(t) => t,
        Err(e) => {
            warn!("{e:#}");
            return None;
        }
    };
    let prompt = transcript.find_user_prompt(parent_uuid);
    if prompt.is_none() && !parent_uuid.is_empty() && transcript.get(parent_uuid).is_none() {
        debug!("reply parent {parent_uuid} is not in the transcript");
    }
    prompt
}
