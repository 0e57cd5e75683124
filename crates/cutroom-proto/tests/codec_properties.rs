//! Property and snapshot tests for the socket codec.
//!
//! The codec sits on the trust boundary: anything the server sends must either
//! decode into a typed event, be ignored as an unknown event, or fail with a
//! `ProtoError`. It must never panic.

use cutroom_proto::{
    Decoded, InboundEvent, JobId, Message, MessageId, OutboundEvent, TypingNotice, UserId,
    decode_inbound, decode_outbound, encode_outbound,
};
use proptest::prelude::*;

#[test]
fn send_message_wire_shape() {
    let event = OutboundEvent::SendMessage {
        job_id: JobId::new("job-7"),
        content: "first cut is up".into(),
        attachments: vec![],
        reply_to_id: Some(MessageId::new("m1")),
    };

    insta::assert_snapshot!(
        encode_outbound(&event).unwrap(),
        @r#"{"event":"sendMessage","data":{"jobId":"job-7","content":"first cut is up","attachments":[],"replyToId":"m1"}}"#
    );
}

#[test]
fn typing_wire_shape() {
    let event = OutboundEvent::Typing { job_id: JobId::new("job-7"), is_typing: false };

    insta::assert_snapshot!(
        encode_outbound(&event).unwrap(),
        @r#"{"event":"typing","data":{"jobId":"job-7","isTyping":false}}"#
    );
}

#[test]
fn reply_is_omitted_when_absent() {
    let event = OutboundEvent::SendMessage {
        job_id: JobId::new("j"),
        content: "x".into(),
        attachments: vec![],
        reply_to_id: None,
    };
    assert!(!encode_outbound(&event).unwrap().contains("replyToId"));
}

#[test]
fn inbound_events_survive_server_encoding() {
    let events = vec![
        InboundEvent::NewMessage(Message::text("m1", "u1", "hello").in_room("j")),
        InboundEvent::UserTyping(TypingNotice {
            user_id: UserId::new("u2"),
            name: "Dana".into(),
            is_typing: true,
            job_id: None,
        }),
    ];

    for event in events {
        let frame = event.encode().unwrap();
        assert_eq!(decode_inbound(&frame).unwrap(), Decoded::Event(event));
    }
}

#[test]
fn outbound_frames_decode_server_side() {
    let event = OutboundEvent::DeleteMessage {
        job_id: JobId::new("j"),
        message_id: MessageId::new("m9"),
    };
    let frame = encode_outbound(&event).unwrap();
    assert_eq!(decode_outbound(&frame).unwrap(), event);
}

proptest! {
    #[test]
    fn prop_decode_never_panics(frame in ".{0,256}") {
        let _ = decode_inbound(&frame);
    }

    #[test]
    fn prop_unknown_names_are_ignored(name in "[a-z]{1,12}") {
        prop_assume!(!matches!(
            name.as_str(),
            "newmessage" | "messagedeleted" | "usertyping" | "error"
        ));
        let frame = format!(r#"{{"event":"{name}","data":null}}"#);
        let decoded = decode_inbound(&frame);
        prop_assert_eq!(decoded, Ok(Decoded::Ignored { event: name }));
    }
}
