//! Parsing of the `/jm <album_id> [chapter_index]` chat command.

use regex::Regex;
use std::num::IntErrorKind;
use std::sync::OnceLock;
use tracing::debug;

use crate::contract::AlbumRequest;
use crate::error::CommandError;

pub const USAGE: &str = "Usage: /jm <album_id> [chapter]";

/// Result of parsing a message that is a `/jm` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    /// `/jm` without arguments; the caller replies with [`USAGE`].
    Usage,
    Album(AlbumRequest),
}

fn command_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^/jm(?:\s+(?P<args>.+))?$").expect("command pattern is a valid regex")
    })
}

pub fn parse_command(text: &str) -> Result<ParsedCommand, CommandError> {
    let text = text.trim();
    let captures = command_pattern()
        .captures(text)
        .ok_or_else(|| CommandError::NotACommand(text.to_string()))?;

    let args = captures.name("args").map(|m| m.as_str().trim()).unwrap_or("");
    let mut parts = args.split_whitespace();

    let Some(album_id) = parts.next() else {
        return Ok(ParsedCommand::Usage);
    };
    if !album_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::InvalidAlbumId(album_id.to_string()));
    }

    let chapter = match parts.next() {
        None => None,
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) if n > 0 => Some(n),
            // Beyond any real chapter count; selection falls back to chapter 1.
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => Some(u32::MAX),
            _ => return Err(CommandError::InvalidChapter(raw.to_string())),
        },
    };

    debug!(album_id, ?chapter, "Parsed /jm command");
    Ok(ParsedCommand::Album(AlbumRequest {
        album_id: album_id.to_string(),
        chapter,
    }))
}
