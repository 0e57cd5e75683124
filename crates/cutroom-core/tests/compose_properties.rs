//! Property-based tests for the composer.
//!
//! - A completed send resets text, files and reply target together
//! - A failed send leaves exactly the draft that was taken

use bytes::Bytes;
use cutroom_core::compose::{Composer, PendingFile};
use cutroom_proto::MessageId;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Text(String),
    File(u8),
    Remove(usize),
    Reply(Option<u8>),
    Begin,
    Fail,
    Complete,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => "[ a-z]{0,8}".prop_map(Op::Text),
        2 => any::<u8>().prop_map(Op::File),
        1 => (0usize..4).prop_map(Op::Remove),
        2 => prop::option::of(0u8..5).prop_map(Op::Reply),
        2 => Just(Op::Begin),
        1 => Just(Op::Fail),
        2 => Just(Op::Complete),
    ]
}

proptest! {
    #[test]
    fn prop_send_outcome_is_all_or_nothing(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut composer = Composer::new();
        let mut taken = None;

        for op in ops {
            match op {
                // edits during an upload are not part of the taken draft
                Op::Text(_) | Op::File(_) | Op::Remove(_) | Op::Reply(_)
                    if composer.is_sending() => {},
                Op::Text(text) => composer.set_text(text),
                Op::File(n) => composer.push_file(PendingFile::new(
                    format!("clip-{n}.mp4"),
                    "video/mp4",
                    Bytes::from(vec![n]),
                )),
                Op::Remove(index) => {
                    composer.remove_file(index);
                },
                Op::Reply(target) => {
                    composer.set_reply_target(target.map(|n| MessageId::new(format!("m{n}"))));
                },
                Op::Begin => {
                    if let Ok(draft) = composer.begin_send() {
                        prop_assert!(composer.is_sending());
                        taken = Some(draft);
                    }
                },
                Op::Fail if composer.is_sending() => {
                    composer.fail_send();
                    let draft = taken.take().unwrap();
                    prop_assert_eq!(composer.text(), draft.text.as_str());
                    prop_assert_eq!(composer.files(), draft.files.as_slice());
                    prop_assert_eq!(composer.reply_target(), draft.reply_to.as_ref());
                },
                Op::Complete if composer.is_sending() => {
                    composer.complete_send();
                    taken = None;
                    prop_assert_eq!(composer.text(), "");
                    prop_assert!(composer.files().is_empty());
                    prop_assert!(composer.reply_target().is_none());
                    prop_assert!(composer.is_clear());
                },
                Op::Fail | Op::Complete => {},
            }
        }
    }
}
