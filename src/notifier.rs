use crate::channels::{
    dispatch, http_client, Channel, ChannelConfig, Phraser, TelegramChannel, VoiceChannel,
};
use crate::preferences::Preferences;
use crate::summary::{build_summary, Summary, SummaryOutcome};
use crate::types::SessionContext;
use anyhow::{Context, Result};
use log::{debug, info};
use minijinja::{context, Environment};

/// Parse the hook payload read from stdin.
pub fn parse_payload(input: &str) -> Result<SessionContext> {
    serde_json::from_str(input).context("parsing hook input")
}

/// Render the chat message from the configured template.
pub fn render_message(template: &str, summary: &Summary) -> Result<String> {
    let env = Environment::new();
    let tmpl = env
        .template_from_str(template)
        .context("parsing chat message template")?;
    tmpl.render(context! {
        summary => summary.to_string(),
        session_id => &summary.session_id,
        project => &summary.project,
        model => &summary.model,
    })
    .context("rendering chat message template")
}

/// Everything one invocation needs: preferences plus the delivery channels
/// selected from the environment.
pub struct Notifier {
    prefs: Preferences,
    config: ChannelConfig,
}

impl Notifier {
    pub fn new(prefs: Preferences, config: ChannelConfig) -> Self {
        Self { prefs, config }
    }

    pub fn chat_channel(&self) -> Result<Option<TelegramChannel>> {
        let Some(credentials) = self.config.telegram.clone() else {
            return Ok(None);
        };
        let client = http_client(self.prefs.timeout())?;
        Ok(Some(TelegramChannel::new(
            client,
            &self.prefs.chat.api_base,
            credentials,
        )))
    }

    pub fn voice_channel(&self) -> Result<VoiceChannel> {
        let client = http_client(self.prefs.timeout())?;
        let phraser = Phraser::new(
            client.clone(),
            self.config.phrasing.clone(),
            self.config.engineer_name.clone(),
        );
        Ok(VoiceChannel::new(
            client,
            self.config.voice.clone(),
            phraser,
            self.prefs.timeout(),
        ))
    }

    /// Channels that announce every finished turn, whether or not a
    /// summary could be built.
    fn announcers(&self) -> Result<Vec<Box<dyn Channel>>> {
        let mut channels: Vec<Box<dyn Channel>> = Vec::new();
        if self.prefs.voice.enabled {
            channels.push(Box::new(self.voice_channel()?));
        }
        Ok(channels)
    }

    /// Channels that carry the summary itself, when enabled in preferences
    /// and usable with the current environment.
    fn summary_channels(&self) -> Result<Vec<Box<dyn Channel>>> {
        let mut channels: Vec<Box<dyn Channel>> = Vec::new();
        if self.prefs.chat.enabled {
            match self.chat_channel()? {
                Some(chat) => channels.push(Box::new(chat)),
                None => debug!("chat disabled: Telegram credentials not set"),
            }
        }
        Ok(channels)
    }

    /// Build the summary for `ctx`. `None` when suppressed.
    pub fn summarize(&self, ctx: &SessionContext) -> Result<Option<String>> {
        match build_summary(ctx, &self.prefs.summary_options())? {
            SummaryOutcome::Suppressed => {
                info!("stop hook already active, skipping summary");
                Ok(None)
            }
            SummaryOutcome::Message(summary) => {
                let template = self.prefs.load_chat_template()?;
                render_message(&template, &summary).map(Some)
            }
        }
    }

    /// Announce the turn and deliver its summary. Returns the delivered
    /// message, if any.
    pub fn notify(&self, ctx: &SessionContext) -> Result<Option<String>> {
        let announcers = self.announcers()?;
        let summary_channels = self.summary_channels()?;
        route(self.summarize(ctx), &announcers, &summary_channels)
    }
}

/// Announce on every parsed payload, then send the summary if one was
/// built. A failed or suppressed (`stop_hook_active`) summary still gets the
/// announcement, with no summary as phrasing context; only the summary
/// channels are skipped.
fn route(
    summary: Result<Option<String>>,
    announcers: &[Box<dyn Channel>],
    summary_channels: &[Box<dyn Channel>],
) -> Result<Option<String>> {
    let context = match &summary {
        Ok(Some(message)) => message.as_str(),
        _ => "",
    };
    dispatch(announcers, context);

    let Some(message) = summary? else {
        return Ok(None);
    };
    let delivered = dispatch(summary_channels, &message);
    info!(
        "summary delivered on {delivered}/{} channels",
        summary_channels.len()
    );
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{PhrasingBackend, VoiceBackend};
    use serde_json::json;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    /// Records every message it is handed.
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Recorder {
        fn new() -> (Box<dyn Channel>, Rc<RefCell<Vec<String>>>) {
            let seen = Rc::new(RefCell::new(Vec::new()));
            (Box::new(Recorder(Rc::clone(&seen))), seen)
        }
    }

    impl Channel for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn deliver(&self, message: &str) -> Result<()> {
            self.0.borrow_mut().push(message.to_string());
            Ok(())
        }
    }

    fn quiet_config() -> ChannelConfig {
        ChannelConfig {
            voice: VoiceBackend::Local,
            phrasing: PhrasingBackend::Canned,
            telegram: None,
            engineer_name: None,
        }
    }

    fn prefs_file(contents: &str) -> (tempfile::TempDir, Preferences) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hooknotify.toml");
        fs::write(&path, contents).unwrap();
        let prefs = Preferences::load(&path).unwrap();
        (dir, prefs)
    }

    fn transcript() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("projects").join("demo");
        fs::create_dir_all(&project).unwrap();
        let path = project.join("s.jsonl");
        let lines = [
            json!({"type": "user", "uuid": "u1", "message": {"role": "user", "content": "ship it"}}),
            json!({"type": "assistant", "uuid": "a1", "parentUuid": "u1",
                   "message": {"role": "assistant", "model": "m-1",
                               "content": [{"type": "text", "text": "shipped"}]}}),
        ];
        let contents = lines
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(&path, contents).unwrap();
        (dir, path.to_str().unwrap().to_string())
    }

    #[test]
    fn parse_payload_rejects_garbage() {
        assert!(parse_payload("not json").is_err());
        assert!(parse_payload("{}").is_ok());
    }

    #[test]
    fn default_template_is_the_summary() {
        let (_dir, path) = transcript();
        let ctx = parse_payload(&format!(
            r#"{{"session_id": "s-1", "transcript_path": "{path}"}}"#
        ))
        .unwrap();
        let notifier = Notifier::new(Preferences::default(), quiet_config());
        let message = notifier.summarize(&ctx).unwrap().unwrap();
        assert!(message.starts_with("*Session:* `s-1`"), "{message}");
        assert!(message.contains("*Prompt:*\nship it"), "{message}");
        assert!(message.ends_with("*Reply:*\nshipped"), "{message}");
    }

    #[test]
    fn custom_template_sees_summary_fields() {
        let (_dir, path) = transcript();
        let (_pdir, prefs) = prefs_file(
            "[chat.template]\ninline = \"{{ project }}/{{ model }}/{{ session_id }}\"\n",
        );
        let ctx = parse_payload(&format!(
            r#"{{"session_id": "s-1", "transcript_path": "{path}"}}"#
        ))
        .unwrap();
        let notifier = Notifier::new(prefs, quiet_config());
        assert_eq!(notifier.summarize(&ctx).unwrap().as_deref(), Some("demo/m-1/s-1"));
    }

    #[test]
    fn suppressed_summary_is_none() {
        let (_dir, path) = transcript();
        let ctx = parse_payload(&format!(
            r#"{{"session_id": "s-1", "transcript_path": "{path}", "stop_hook_active": true}}"#
        ))
        .unwrap();
        let notifier = Notifier::new(Preferences::default(), quiet_config());
        assert_eq!(notifier.summarize(&ctx).unwrap(), None);
    }

    #[test]
    fn missing_session_id_still_announces() {
        let ctx = parse_payload(r#"{"transcript_path": "/x"}"#).unwrap();
        let notifier = Notifier::new(Preferences::default(), quiet_config());
        let (voice, voice_seen) = Recorder::new();
        let (chat, chat_seen) = Recorder::new();

        let err = route(notifier.summarize(&ctx), &[voice], &[chat]).unwrap_err();

        assert!(format!("{err:#}").contains("session_id"), "{err:#}");
        assert_eq!(*voice_seen.borrow(), vec![String::new()]);
        assert!(chat_seen.borrow().is_empty());
    }

    #[test]
    fn suppressed_summary_still_announces() {
        let (_dir, path) = transcript();
        let ctx = parse_payload(&format!(
            r#"{{"session_id": "s-1", "transcript_path": "{path}", "stop_hook_active": true}}"#
        ))
        .unwrap();
        let notifier = Notifier::new(Preferences::default(), quiet_config());
        let (voice, voice_seen) = Recorder::new();
        let (chat, chat_seen) = Recorder::new();

        let sent = route(notifier.summarize(&ctx), &[voice], &[chat]).unwrap();

        assert_eq!(sent, None);
        assert_eq!(voice_seen.borrow().len(), 1);
        assert!(chat_seen.borrow().is_empty());
    }

    #[test]
    fn built_summary_reaches_every_channel() {
        let (_dir, path) = transcript();
        let ctx = parse_payload(&format!(
            r#"{{"session_id": "s-1", "transcript_path": "{path}"}}"#
        ))
        .unwrap();
        let notifier = Notifier::new(Preferences::default(), quiet_config());
        let (voice, voice_seen) = Recorder::new();
        let (chat, chat_seen) = Recorder::new();

        let sent = route(notifier.summarize(&ctx), &[voice], &[chat])
            .unwrap()
            .unwrap();

        assert!(sent.contains("*Reply:*\nshipped"), "{sent}");
        assert_eq!(*voice_seen.borrow(), vec![sent.clone()]);
        assert_eq!(*chat_seen.borrow(), vec![sent]);
    }

    #[test]
    fn notify_with_all_channels_disabled() {
        let (_dir, path) = transcript();
        let (_pdir, prefs) = prefs_file("[voice]\nenabled = false\n[chat]\nenabled = false\n");
        let ctx = parse_payload(&format!(
            r#"{{"session_id": "s-1", "transcript_path": "{path}"}}"#
        ))
        .unwrap();
        let notifier = Notifier::new(prefs, quiet_config());
        assert!(notifier.announcers().unwrap().is_empty());
        assert!(notifier.summary_channels().unwrap().is_empty());
        assert!(notifier.notify(&ctx).unwrap().is_some());
    }

    #[test]
    fn chat_channel_requires_credentials() {
        let notifier = Notifier::new(Preferences::default(), quiet_config());
        assert!(notifier.chat_channel().unwrap().is_none());
    }

    #[test]
    fn broken_template_is_an_error() {
        let (_dir, path) = transcript();
        let (_pdir, prefs) = prefs_file("[chat.template]\ninline = \"{{ summary \"\n");
        let ctx = parse_payload(&format!(
            r#"{{"session_id": "s-1", "transcript_path": "{path}"}}"#
        ))
        .unwrap();
        let err = Notifier::new(prefs, quiet_config()).summarize(&ctx).unwrap_err();
        assert!(format!("{err:#}").contains("template"), "{err:#}");
    }
}
