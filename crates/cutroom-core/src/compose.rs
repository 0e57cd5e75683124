//! Outgoing message staging.
//!
//! The composer holds the text, files and reply target for the next send.
//! All three are cleared together by [`Composer::complete_send`]; there is no
//! API that resets one without the others.

use bytes::Bytes;
use cutroom_proto::MessageId;

use crate::error::ComposeError;

/// A locally selected file waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    /// Display name
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// File content
    pub data: Bytes,
}

impl PendingFile {
    /// Create a staged file.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self { name: name.into(), mime_type: mime_type.into(), data }
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Everything a single send carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    /// Message text
    pub text: String,
    /// Files to upload before the message is emitted
    pub files: Vec<PendingFile>,
    /// Message being replied to
    pub reply_to: Option<MessageId>,
}

impl Draft {
    /// True if the draft needs an upload before it can be emitted.
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }
}

/// Compose state for the active room.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    draft: Draft,
    sending: bool,
}

impl Composer {
    /// Create an empty composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.draft.text = text.into();
    }

    /// Stage a file.
    pub fn push_file(&mut self, file: PendingFile) {
        self.draft.files.push(file);
    }

    /// Unstage the file at `index`. Returns it, if the index was valid.
    pub fn remove_file(&mut self, index: usize) -> Option<PendingFile> {
        (index < self.draft.files.len()).then(|| self.draft.files.remove(index))
    }

    /// Set or clear the reply target.
    pub fn set_reply_target(&mut self, reply_to: Option<MessageId>) {
        self.draft.reply_to = reply_to;
    }

    /// Current text.
    pub fn text(&self) -> &str {
        &self.draft.text
    }

    /// Staged files.
    pub fn files(&self) -> &[PendingFile] {
        &self.draft.files
    }

    /// Current reply target.
    pub fn reply_target(&self) -> Option<&MessageId> {
        self.draft.reply_to.as_ref()
    }

    /// True while a send is waiting on its upload.
    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// True if nothing is staged: whitespace-only text and no files.
    pub fn is_empty(&self) -> bool {
        self.draft.text.trim().is_empty() && self.draft.files.is_empty()
    }

    /// Send precondition.
    pub fn can_send(&self) -> bool {
        !self.sending && !self.is_empty()
    }

    /// Start a send and return a copy of the draft.
    ///
    /// The staged state is left untouched until the send either completes or
    /// fails; the composer refuses a second send in the meantime.
    pub fn begin_send(&mut self) -> Result<Draft, ComposeError> {
        if self.sending {
            return Err(ComposeError::SendInProgress);
        }
        if self.is_empty() {
            return Err(ComposeError::Empty);
        }
        self.sending = true;
        Ok(self.draft.clone())
    }

    /// The send failed; keep everything staged for a retry.
    pub fn fail_send(&mut self) {
        self.sending = false;
    }

    /// The send went out; reset text, files and reply target at once.
    pub fn complete_send(&mut self) {
        *self = Self::default();
    }

    /// True if text, files and reply target are all in their reset state.
    pub fn is_clear(&self) -> bool {
        self.draft == Draft::default() && !self.sending
    }
}
