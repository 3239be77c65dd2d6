//! selclip - X11 clipboard from the command line
//!
//! # Usage
//!
//! ```bash
//! # Copy an argument (or stdin) to the clipboard; returns once a
//! # background process owns it
//! selclip copy "some text"
//! echo hello | selclip copy
//!
//! # Keep the owner in the foreground until another client copies
//! selclip copy --foreground "some text"
//!
//! # Print the clipboard (or the primary selection)
//! selclip paste
//! selclip paste --primary
//!
//! # List the targets the current owner offers
//! selclip targets --json
//! ```

use std::io::{self, IsTerminal, Read, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use selclip_core::{ClipboardConfig, Selection};
use selclipd::Clipboard;

/// selclip - get and set the X11 clipboard
#[derive(Parser, Debug)]
#[command(name = "selclip", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy text to the clipboard
    Copy {
        /// Text to copy (read from stdin if omitted)
        text: Option<String>,

        /// Serve the clipboard from this process instead of detaching
        #[arg(short, long)]
        foreground: bool,
    },
    /// Print the clipboard contents
    Paste {
        /// Read the primary selection instead of the clipboard
        #[arg(short, long)]
        primary: bool,
    },
    /// List the targets offered by the selection owner
    Targets {
        /// Query the primary selection instead of the clipboard
        #[arg(short, long)]
        primary: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct TargetsReport<'a> {
    selection: Selection,
    targets: &'a [String],
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    let mut config = ClipboardConfig::load().context("Failed to load configuration")?;

    match args.command {
        Command::Copy { text, foreground } => {
            if foreground {
                config.detach = false;
            }
            let text = match text {
                Some(text) => text,
                None => read_stdin()?,
            };
            let clipboard = Clipboard::from_config(config)?;
            debug!(bytes = text.len(), detach = clipboard.config().detach, "Copying");
            clipboard.set(&text).context("Failed to set clipboard")?;
            debug!("Clipboard set");
            Ok(())
        }
        Command::Paste { primary } => {
            let clipboard = Clipboard::from_config(config)?;
            let text = clipboard
                .get_selection(selection(primary))
                .context("Failed to read clipboard")?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
        Command::Targets { primary, json } => {
            let selection = selection(primary);
            let clipboard = Clipboard::from_config(config)?;
            let targets = clipboard
                .targets(selection)
                .context("Failed to list targets")?;

            if json {
                let report = TargetsReport {
                    selection,
                    targets: &targets,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for target in &targets {
                    println!("{target}");
                }
            }
            Ok(())
        }
    }
}

fn selection(primary: bool) -> Selection {
    if primary {
        Selection::Primary
    } else {
        Selection::Clipboard
    }
}

fn read_stdin() -> Result<String> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        debug!("Reading clipboard text from terminal until EOF");
    }
    let mut text = String::new();
    stdin
        .read_to_string(&mut text)
        .context("Failed to read text from stdin")?;
    Ok(text)
}

fn init_tracing() -> Result<()> {
    let filter = if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("selclip=info,selclipd=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {e}"))
}
