//! Line-oriented rendering.
//!
//! The terminal is append-only. Instead of redrawing a screen, [`ChatView`]
//! compares the app with what it already printed and returns only the lines
//! describing the difference: new messages, messages changed in place
//! (deleted, reacted to), and changes of the banner, typing and error lines.

use std::collections::HashMap;

use cutroom_app::{ChatApp, RoomStatus};
use cutroom_core::env::Moment;
use cutroom_proto::{JobId, Message, MessageId};

/// What has been printed so far.
#[derive(Debug, Default)]
pub struct ChatView {
    room: Option<JobId>,
    status: Option<RoomStatus>,
    printed: HashMap<MessageId, String>,
    banner: Option<String>,
    notice: Option<String>,
    request_error: Option<String>,
    typing: Option<String>,
    composer: Option<String>,
}

impl ChatView {
    /// Nothing printed yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print so the terminal reflects `app`.
    pub fn update<I: Moment>(&mut self, app: &ChatApp<I>) -> Vec<String> {
        let mut lines = Vec::new();

        if app.active_job() != self.room.as_ref() {
            self.room = app.active_job().cloned();
            self.status = None;
            self.printed.clear();
            self.typing = None;
            lines.push(match &self.room {
                Some(job_id) => format!("== {job_id} =="),
                None => "== not in a room ==".to_owned(),
            });
        }

        if let Some(banner) = replace(&mut self.banner, app.banner().map(ToString::to_string)) {
            lines.push(format!("! {banner}"));
        }

        let status = app.room_status();
        if status != self.status {
            self.status = status;
            if status == Some(RoomStatus::Loading) {
                lines.push("  loading history...".to_owned());
            }
        }

        for message in app.messages() {
            let line = format_message(app, message);
            match self.printed.get(&message.id) {
                None => lines.push(line.clone()),
                Some(previous) if *previous != line => lines.push(format!("~ {line}")),
                Some(_) => continue,
            }
            self.printed.insert(message.id.clone(), line);
        }

        if let Some(label) = replace(&mut self.typing, app.typing_label()) {
            lines.push(format!("  {label}"));
        }
        if let Some(notice) = replace(&mut self.notice, app.notice().map(str::to_owned)) {
            lines.push(format!("! server: {notice}"));
        }
        let request_error = app.request_error().map(ToString::to_string);
        if let Some(error) = replace(&mut self.request_error, request_error) {
            lines.push(format!("! {error}"));
        }
        if let Some(composer) = replace(&mut self.composer, composer_line(app)) {
            lines.push(format!("> {composer}"));
        }
        lines
    }
}

/// Store `next` in `slot`. Returns it if it changed and is something to show.
fn replace(slot: &mut Option<String>, next: Option<String>) -> Option<String> {
    if *slot == next {
        return None;
    }
    slot.clone_from(&next);
    next
}

fn format_message<I: Moment>(app: &ChatApp<I>, message: &Message) -> String {
    let mut line = format!("[{}] {}", message.id, message.sender_id);
    if let Some(reply_to) = &message.reply_to {
        line.push_str(&format!(" (re: {})", app.reply_preview(reply_to)));
    }
    line.push_str(": ");
    line.push_str(&message.content);

    for attachment in &message.attachments {
        line.push_str(&format!(" [+ {} {}]", attachment.name, human_size(attachment.size)));
    }
    for reaction in &message.reactions {
        line.push_str(&format!(" {}{}", reaction.emoji, reaction.count));
    }
    line
}

/// Pending reply target and queued files, if any.
fn composer_line<I: Moment>(app: &ChatApp<I>) -> Option<String> {
    let composer = app.composer();
    let mut parts = Vec::new();
    if let Some(reply_to) = composer.reply_target() {
        parts.push(format!("replying to {}", app.reply_preview(reply_to)));
    }
    if !composer.files().is_empty() {
        let names: Vec<_> = composer.files().iter().map(|f| f.name.as_str()).collect();
        parts.push(format!("attached: {}", names.join(", ")));
    }
    if composer.is_sending() {
        parts.push("sending...".to_owned());
    }
    if parts.is_empty() { None } else { Some(parts.join("; ")) }
}

fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    match bytes {
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{} KB", b / KB),
        b => format!("{b} B"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use cutroom_app::{AppAction, AppEvent, ChatConfig, RequestTag};
    use cutroom_proto::{DeletedNotice, InboundEvent, Reaction};

    use super::*;

    fn open(app: &mut ChatApp<Instant>) -> RequestTag {
        app.handle(AppEvent::OpenRoom { job_id: "job-7".into(), token: Some("t".into()) })
            .into_iter()
            .find_map(|action| match action {
                AppAction::FetchSnapshot { tag } => Some(tag),
                _ => None,
            })
            .unwrap()
    }

    fn live(app: &mut ChatApp<Instant>, event: InboundEvent) {
        app.handle(AppEvent::FrameReceived { frame: event.encode().unwrap(), now: Instant::now() });
    }

    #[test]
    fn prints_only_what_changed() {
        let mut app = ChatApp::new(ChatConfig::new("me"));
        let mut view = ChatView::new();
        let tag = open(&mut app);
        app.handle(AppEvent::TransportOpened);

        let first = view.update(&app);
        insta::assert_snapshot!(first.join("\n"), @r"
        == job-7 ==
          loading history...
        ");

        let mut original = Message::text("msg-1", "dana", "first pass attached").in_room("job-7");
        original.reactions.push(Reaction::new("🎬", 1));
        app.handle(AppEvent::SnapshotLoaded { tag, result: Ok(vec![original]) });
        let mut reply = Message::text("msg-2", "lee", "cut the intro").in_room("job-7");
        reply.reply_to = Some("msg-1".into());
        live(&mut app, InboundEvent::NewMessage(reply));

        insta::assert_snapshot!(view.update(&app).join("\n"), @r"
        [msg-1] dana: first pass attached 🎬1
        [msg-2] lee (re: first pass attached): cut the intro
        ");
        assert!(view.update(&app).is_empty(), "nothing new");

        live(
            &mut app,
            InboundEvent::MessageDeleted(DeletedNotice {
                message_id: "msg-1".into(),
                job_id: Some("job-7".into()),
            }),
        );
        insta::assert_snapshot!(view.update(&app).join("\n"), @r"
        ~ [msg-1] dana: This message has been deleted 🎬1
        ~ [msg-2] lee (re: This message has been deleted): cut the intro
        ");
    }

    #[test]
    fn leaving_room_is_announced() {
        let mut app = ChatApp::new(ChatConfig::new("me"));
        let mut view = ChatView::new();
        let tag = open(&mut app);
        let message = Message::text("msg-1", "dana", "hi").in_room("job-7");
        app.handle(AppEvent::SnapshotLoaded { tag, result: Ok(vec![message]) });
        view.update(&app);

        app.handle(AppEvent::Close);
        insta::assert_snapshot!(view.update(&app).join("\n"), @"== not in a room ==");
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(20 * 1024), "20 KB");
        assert_eq!(human_size(3 * 1024 * 1024 + 512 * 1024), "3.5 MB");
    }
}
