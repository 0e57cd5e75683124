//! Line commands typed at the prompt.
//!
//! Plain text is sent as a message. Lines starting with `/` are commands:
//!
//! ```text
//! /room <job>            switch room
//! /reply <message>       reply to a message (/reply alone clears)
//! /attach <path>         queue a file
//! /detach <n>            remove the n-th queued file (from 1)
//! /react <message> <emoji>
//! /delete <message>
//! /dismiss               clear the error line
//! /close                 leave the room and disconnect
//! /quit
//! ```

use std::path::{Path, PathBuf};

use cutroom_proto::{JobId, MessageId};
use thiserror::Error;

/// A parsed prompt line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send this text
    Say(String),
    /// Open a room
    Room(JobId),
    /// Set or clear the reply target
    Reply(Option<MessageId>),
    /// Read a file and queue it
    Attach(PathBuf),
    /// Drop a queued file by index
    Detach(usize),
    /// React to a message
    React {
        /// Target message
        message_id: MessageId,
        /// Emoji to add
        emoji: String,
    },
    /// Delete a message
    Delete(MessageId),
    /// Clear error and notice lines
    Dismiss,
    /// Leave and disconnect
    Close,
    /// Exit
    Quit,
}

/// Line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Unknown `/name`
    #[error("unknown command /{0}")]
    Unknown(String),
    /// Missing or malformed arguments
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse one prompt line. Returns `None` for a blank line.
pub fn parse(line: &str) -> Option<Result<Command, CommandError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Ok(Command::Say(line.to_owned())));
    };

    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();
    let mut words = args.split_whitespace();

    let command = match name {
        "room" => match words.next() {
            Some(job) => Ok(Command::Room(JobId::new(job))),
            None => Err(CommandError::Usage("/room <job>")),
        },
        "reply" => Ok(Command::Reply(words.next().map(MessageId::new))),
        "attach" if !args.is_empty() => Ok(Command::Attach(PathBuf::from(args))),
        "attach" => Err(CommandError::Usage("/attach <path>")),
        "detach" => match words.next().and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n > 0 => Ok(Command::Detach(n - 1)),
            _ => Err(CommandError::Usage("/detach <n>")),
        },
        "react" => match (words.next(), words.next()) {
            (Some(id), Some(emoji)) => {
                Ok(Command::React { message_id: MessageId::new(id), emoji: emoji.to_owned() })
            },
            _ => Err(CommandError::Usage("/react <message> <emoji>")),
        },
        "delete" => match words.next() {
            Some(id) => Ok(Command::Delete(MessageId::new(id))),
            None => Err(CommandError::Usage("/delete <message>")),
        },
        "dismiss" => Ok(Command::Dismiss),
        "close" => Ok(Command::Close),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_owned())),
    };
    Some(command)
}

/// MIME type for an attachment, from its extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        Some("txt" | "srt") => "text/plain",
        _ => "application/octet-stream",
    }
}
