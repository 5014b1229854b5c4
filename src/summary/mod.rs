use crate::transcript::{self, non_blank, NormalizedReply};
use crate::types::SessionContext;
use log::debug;
use std::fmt;
use std::path::{Component, Path};

/// Path segment after which Claude Code stores per-project transcripts:
/// `~/.claude/projects/<project>/<session>.jsonl`.
pub const DEFAULT_PROJECT_MARKER: &str = "projects";

// ===================================================================
// Input / output
// ===================================================================

#[derive(Debug, Clone)]
pub struct SummaryOptions {
    pub project_marker: String,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            project_marker: DEFAULT_PROJECT_MARKER.into(),
        }
    }
}

pub enum SummaryOutcome {
    Message(Summary),
    /// `stop_hook_active` was set: a previous stop cycle is still running,
    /// so nothing is built or sent.
    Suppressed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SummaryError {
    #[error("hook payload is missing `{0}`")]
    MissingField(&'static str),
}

/// How a section body is laid out after its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// `*Label:* body`
    Inline,
    /// `*Label:* `body``
    Code,
    /// Label on its own line, body below.
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    label: &'static str,
    body: String,
    layout: Layout,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.layout {
            Layout::Inline => write!(f, "*{}:* {}", self.label, self.body),
            Layout::Code => write!(f, "*{}:* `{}`", self.label, self.body),
            Layout::Block => write!(f, "*{}:*\n{}", self.label, self.body),
        }
    }
}

/// The assembled turn summary: optional header, ordered sections, optional
/// trailing annotation. Rendered as Markdown via `Display`.
#[derive(Debug, Clone)]
pub struct Summary {
    pub session_id: String,
    pub model: Option<String>,
    pub project: Option<String>,
    title: Option<String>,
    sections: Vec<Section>,
    annotation: Option<String>,
}

impl Summary {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            model: None,
            project: None,
            title: None,
            sections: Vec::new(),
            annotation: None,
        }
    }

    /// Append a section unless `value` is absent or blank. The body is kept
    /// as given, so indentation in tool content survives.
    fn push(&mut self, label: &'static str, value: Option<&str>, layout: Layout) {
        if let Some(body) = value.filter(|v| !v.trim().is_empty()) {
            self.sections.push(Section {
                label,
                body: body.to_string(),
                layout,
            });
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(title) = &self.title {
            write!(f, "*{title}*\n\n")?;
        }
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }
            write!(f, "{section}")?;
        }
        if let Some(annotation) = &self.annotation {
            write!(f, "\n\n---\n⚠️ {annotation}")?;
        }
        Ok(())
    }
}

// ===================================================================
// Builder
// ===================================================================

/// The project directory name following `marker` in `transcript_path`.
pub fn project_name(transcript_path: &str, marker: &str) -> Option<String> {
    let mut components = Path::new(transcript_path).components().filter_map(|c| match c {
        Component::Normal(s) => s.to_str(),
        _ => None,
    });
    components.find(|c| *c == marker)?;
    non_blank(components.next())
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, SummaryError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(SummaryError::MissingField(field))
}

/// Build the summary for one hook invocation.
///
/// Reads the transcript twice: once from the end to locate the latest
/// reply, once in full to walk from that reply back to its prompt.
pub fn build_summary(
    ctx: &SessionContext,
    options: &SummaryOptions,
) -> Result<SummaryOutcome, SummaryError> {
    let session_id = required(ctx.session_id.as_deref(), "session_id")?;
    let transcript_path = required(ctx.transcript_path.as_deref(), "transcript_path")?;
    let expanded = transcript::expand_home(transcript_path);
    let path = expanded.as_path();

    let mut summary = Summary::new(session_id);
    summary.push("Session", Some(session_id), Layout::Code);

    let reply = match transcript::locate_latest_reply(path) {
        Ok(reply) => Some(reply),
        Err(reason) => {
            debug!("no reply section: {reason}");
            None
        }
    };
    let model = reply.as_ref().and_then(|r| r.model.clone());
    summary.push("Model", model.as_deref(), Layout::Inline);
    summary.model = model;

    let project = project_name(transcript_path, &options.project_marker);
    summary.push("Project", project.as_deref(), Layout::Inline);
    summary.project = project;

    if ctx.stop_hook_active {
        return Ok(SummaryOutcome::Suppressed);
    }

    summary.push("Tool", ctx.tool_name.as_deref(), Layout::Inline);
    summary.push("File", ctx.tool_input_file_path(), Layout::Code);
    summary.push("Content", ctx.tool_input_content(), Layout::Block);
    summary.push("Response file", ctx.tool_response_file_path(), Layout::Inline);
    let success = ctx.tool_success().map(|s| s.to_string());
    summary.push("Success", success.as_deref(), Layout::Inline);

    if let Some(NormalizedReply { parent_uuid, .. }) = &reply {
        let prompt = transcript::recover_prompt(path, parent_uuid);
        summary.push("Prompt", prompt.as_deref(), Layout::Block);
    }
    summary.push(
        "Reply",
        reply.as_ref().and_then(|r| r.text.as_deref()),
        Layout::Block,
    );

    summary.title = non_blank(ctx.title.as_deref());
    summary.annotation = non_blank(ctx.message.as_deref());

    Ok(SummaryOutcome::Message(summary))
}
