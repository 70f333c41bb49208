///
/// This module implements the CLI interface for jm-bot: command parsing, argument validation and
/// the async entrypoint shared by `main()` and the integration tests.
///
/// All pipeline logic (parsing `/jm`, chapter selection, download, PDF assembly) lives in the
/// [`jm-bot-core`] crate. This module only wires configuration, the crawler bridge, the NapCat
/// client and a chat responder together, then hands one message to the pipeline.
///
/// ## How To Use
/// - `jm-bot handle --group 123456 "/jm 350234 2"` runs one chat command end to end.
/// - `jm-bot chapters 350234` lists an album's chapters.
/// - Add `--console` to `handle` to print replies locally instead of sending them to the chat.
///
/// [`jm-bot-core`]: ../../jm-bot-core/
use crate::load_config::load_config;
use crate::respond::{describe_target, ConsoleResponder};
use crate::upload::NapcatClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jm_bot_core::contract::{ChatResponder, ChatTarget, Crawler};
use jm_bot_core::download::JmcomicCrawler;
use jm_bot_core::pipeline::{handle_command, CommandReport};
use std::path::PathBuf;

/// CLI for jm-bot: deliver JM album chapters as PDFs into QQ chats through NapCat.
#[derive(Parser)]
#[clap(
    name = "jm-bot",
    version,
    about = "Download a JM album chapter, assemble it into a PDF and upload it to a chat through NapCat"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Handle one chat message containing a /jm command
    Handle {
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Group the command came from
        #[clap(long, conflicts_with = "user", required_unless_present = "user")]
        group: Option<i64>,
        /// User the command came from, for private chats
        #[clap(long)]
        user: Option<i64>,
        /// Print replies to stdout instead of sending them to the chat
        #[clap(long)]
        console: bool,
        /// The message text, e.g. "/jm 350234 2"
        message: String,
    },
    /// List the chapters of an album
    Chapters {
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        album_id: String,
    },
}

fn chat_target(group: Option<i64>, user: Option<i64>) -> Result<ChatTarget> {
    match (group, user) {
        (Some(id), _) => Ok(ChatTarget::Group(id)),
        (None, Some(id)) => Ok(ChatTarget::Private(id)),
        (None, None) => anyhow::bail!("either --group or --user is required"),
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Handle {
            config,
            group,
            user,
            console,
            message,
        } => {
            let target = chat_target(group, user)?;
            let config = load_config(config)?;
            let crawler = JmcomicCrawler::new(config.crawler.clone());
            let napcat = NapcatClient::new(config.napcat.clone())
                .context("Failed to initialise NapCat client")?;
            let responder: &dyn ChatResponder = if console { &ConsoleResponder } else { &napcat };

            tracing::info!(chat = %describe_target(&target), "Handling chat command");
            match handle_command(
                &config.pipeline,
                &crawler,
                &napcat,
                responder,
                &target,
                &message,
            )
            .await
            {
                Ok(CommandReport::Usage) => Ok(()),
                Ok(CommandReport::Delivered(report)) => {
                    tracing::info!(?report, "Command complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(error = %e, "Command failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Chapters { config, album_id } => {
            let config = load_config(config)?;
            let crawler = JmcomicCrawler::new(config.crawler);
            let detail = crawler
                .album_detail(&album_id)
                .await
                .with_context(|| format!("Failed to fetch chapters of album {album_id}"))?;
            println!("{} ({} chapters)", detail.title, detail.chapter_count());
            for (i, chapter) in detail.chapters.iter().enumerate() {
                println!("{:>3}  {}  {}", i + 1, chapter.photo_id, chapter.title);
            }
            Ok(())
        }
    }
}
