#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// Credential and config variables that must not leak in from the
/// developer's environment.
const SCRUBBED_VARS: &[&str] = &[
    "ELEVENLABS_API_KEY",
    "ELEVENLABS_VOICE_ID",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHAT_ID",
    "ENGINEER_NAME",
    "HOOKNOTIFY_CONFIG",
    "HOOKNOTIFY_LOG",
];

/// Run the binary with `args`, feeding `stdin`, with a scrubbed
/// environment plus `env`.
pub fn run_cli(args: &[&str], stdin: &str, env: &[(&str, &str)]) -> (i32, String, String) {
    let mut command = Command::new(env!("CARGO_BIN_EXE_hooknotify"));
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for var in SCRUBBED_VARS {
        command.env_remove(var);
    }
    for (k, v) in env {
        command.env(k, v);
    }
    let mut child = command.spawn().expect("failed to spawn binary");

    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();

    let output = child.wait_with_output().unwrap();
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

/// A temp dir holding a preferences file and a Claude-style transcript at
/// `projects/demo-app/session.jsonl`. Voice is disabled so tests never
/// try to speak.
pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_prefs("")
    }

    /// `extra` is appended to the `[chat]` table.
    pub fn with_prefs(extra: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("hooknotify.toml"),
            format!("timeout_secs = 3\n\n[voice]\nenabled = false\n\n[chat]\n{extra}\n"),
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("projects").join("demo-app")).unwrap();
        Self { dir }
    }

    pub fn config(&self) -> String {
        self.dir.path().join("hooknotify.toml").to_str().unwrap().to_string()
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.dir.path().join("projects").join("demo-app").join("session.jsonl")
    }

    pub fn write_transcript(&self, lines: &[&str]) -> String {
        let path = self.transcript_path();
        std::fs::write(&path, lines.join("\n")).unwrap();
        path.to_str().unwrap().to_string()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

pub const USER_PROMPT: &str =
    r#"{"type":"user","uuid":"u1","parentUuid":null,"sessionId":"s","message":{"role":"user","content":"Fix the flaky test"}}"#;
pub const ASSISTANT_TOOL_USE: &str =
    r#"{"type":"assistant","uuid":"a1","parentUuid":"u1","message":{"role":"assistant","model":"claude-sonnet-4-5-20250929","content":[{"type":"tool_use","id":"toolu_1","name":"Bash","input":{"command":"cargo test"}}]}}"#;
pub const TOOL_RESULT: &str =
    r#"{"type":"user","uuid":"t1","parentUuid":"a1","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"toolu_1","content":"ok"}]}}"#;
pub const ASSISTANT_REPLY: &str =
    r#"{"type":"assistant","uuid":"a2","parentUuid":"t1","message":{"role":"assistant","model":"claude-sonnet-4-5-20250929","content":[{"type":"text","text":"The test is stable now."}]}}"#;

/// Stop payload for `transcript_path`.
pub fn stop_payload(transcript_path: &str, stop_hook_active: bool) -> String {
    format!(
        r#"{{
    "session_id": "test-session",
    "transcript_path": "{transcript_path}",
    "cwd": "/tmp",
    "permission_mode": "default",
    "hook_event_name": "Stop",
    "stop_hook_active": {stop_hook_active}
}}"#
    )
}

/// Serve exactly one HTTP request on a local port, answering with
/// `status_line` and `body`. The join handle yields the raw request.
pub fn serve_once(
    status_line: &'static str,
    body: &'static str,
) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut head = String::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = v.trim().parse().unwrap();
            }
            head.push_str(&line);
            if line == "\r\n" || line.is_empty() {
                break;
            }
        }
        let mut request_body = vec![0u8; content_length];
        reader.read_exact(&mut request_body).unwrap();
        let mut stream = stream;
        write!(
            stream,
            "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        head + &String::from_utf8(request_body).unwrap()
    });
    (base, handle)
}

/// A local URL nothing listens on.
pub fn dead_url() -> String {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    format!("http://127.0.0.1:{port}")
}

pub const TELEGRAM_ENV: &[(&str, &str)] = &[
    ("TELEGRAM_BOT_TOKEN", "123:abc"),
    ("TELEGRAM_CHAT_ID", "42"),
];
