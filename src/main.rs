mod channels;
mod notifier;
mod preferences;
mod summary;
mod transcript;
mod types;

use anyhow::{bail, Context, Result};
use channels::{Channel, ChannelConfig, ChatError};
use clap::{Parser, Subcommand};
use log::warn;
use notifier::{parse_payload, Notifier};
use preferences::Preferences;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

/// Post-turn notifier for Claude Code hooks.
#[derive(Debug, Parser)]
#[command(name = "hooknotify", version)]
struct Cli {
    /// Preferences file (default: $HOOKNOTIFY_CONFIG, then the user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read a hook payload from stdin, summarize the turn and deliver it.
    /// Always exits 0. This is the default.
    Hook,
    /// Read a hook payload from stdin and print the summary without sending it.
    Summarize,
    /// Send a message to the configured Telegram chat.
    Chat {
        /// Message text; read from stdin when omitted.
        message: Option<String>,
    },
    /// Speak a message, or a generated completion phrase.
    Speak {
        text: Option<String>,
    },
}

/// Exit codes of the standalone commands. The hook path always exits 0.
const EXIT_FAILURE: i32 = 1;
const EXIT_CHAT_REJECTED: i32 = 4;
const EXIT_CHAT_UNREACHABLE: i32 = 5;

/// Chat delivery failures get their own codes so scripts can tell a
/// refused message from a network problem.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ChatError>() {
        Some(ChatError::Rejected { .. }) => EXIT_CHAT_REJECTED,
        Some(ChatError::Transport(_)) => EXIT_CHAT_UNREACHABLE,
        None => EXIT_FAILURE,
    }
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("reading stdin")?;
    Ok(buffer)
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("HOOKNOTIFY_LOG", "warn"))
        .target(env_logger::Target::Stderr)
        .init();
}

fn load_notifier(config: Option<&Path>) -> Result<Notifier> {
    let prefs = match Preferences::locate(config) {
        Some(path) => Preferences::load(&path)?,
        None => Preferences::default(),
    };
    Ok(Notifier::new(prefs, ChannelConfig::from_env()))
}

/// The hook path: failures are logged and swallowed so Claude Code is
/// never blocked by a notification problem.
fn run_hook(config: Option<&Path>) {
    let result = read_stdin().and_then(|input| {
        let ctx = parse_payload(&input)?;
        let notifier = match load_notifier(config) {
            Ok(n) => n,
            Err(e) => {
                warn!("{e:#}; using default preferences");
                Notifier::new(Preferences::default(), ChannelConfig::from_env())
            }
        };
        notifier.notify(&ctx)
    });
    if let Err(e) = result {
        warn!("{e:#}");
    }
}

fn run_summarize(config: Option<&Path>) -> Result<()> {
    let ctx = parse_payload(&read_stdin()?)?;
    if let Some(message) = load_notifier(config)?.summarize(&ctx)? {
        println!("{message}");
    }
    Ok(())
}

fn run_chat(config: Option<&Path>, message: Option<String>) -> Result<()> {
    let message = match message {
        Some(m) => m,
        None => read_stdin()?,
    };
    if message.trim().is_empty() {
        bail!("no message to send");
    }
    let notifier = load_notifier(config)?;
    let Some(chat) = notifier.chat_channel()? else {
        bail!(
            "{} and {} must both be set",
            channels::TELEGRAM_BOT_TOKEN,
            channels::TELEGRAM_CHAT_ID
        );
    };
    chat.deliver(message.trim())
}

fn run_speak(config: Option<&Path>, text: Option<String>) -> Result<()> {
    let voice = load_notifier(config)?.voice_channel()?;
    voice.announce(text.as_deref())?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging();
    let config = cli.config.as_deref();

    let result = match cli.command.unwrap_or(Command::Hook) {
        Command::Hook => {
            run_hook(config);
            Ok(())
        }
        Command::Summarize => run_summarize(config),
        Command::Chat { message } => run_chat(config, message),
        Command::Speak { text } => run_speak(config, text),
    };

    if let Err(err) = result {
        eprintln!("hooknotify: {err:#}");
        process::exit(exit_code(&err));
    }
}
