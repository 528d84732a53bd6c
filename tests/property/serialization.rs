//! Property-based serialization round-trip tests.
//!
//! Uses proptest to verify:
//! 1. Any valid `Task` survives an encode → decode round-trip.
//! 2. Any valid `StoreMessage` survives an encode → decode round-trip.
//! 3. Random bytes never cause a panic in `decode` (returns `Err` gracefully).

use proptest::prelude::*;
use termtodo_proto::store::{self, MutationOp, StoreMessage};
use termtodo_proto::task::{Task, TaskId};
use uuid::Uuid;

// --- Arbitrary implementations for protocol types ---

/// Strategy for generating arbitrary `TaskId` values.
fn arb_task_id() -> impl Strategy<Value = TaskId> {
    any::<u128>().prop_map(|n| TaskId::from_uuid(Uuid::from_u128(n)))
}

/// Strategy for generating arbitrary task text.
/// Uses non-empty strings to match what the store ever persists.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[^\x00]{1,256}").expect("valid regex")
}

/// Strategy for generating arbitrary due date values, including absent.
fn arb_due_date() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), "[ -~]{1,32}".prop_map(Some)]
}

/// Strategy for generating arbitrary `Task` values.
fn arb_task() -> impl Strategy<Value = Task> {
    (
        arb_task_id(),
        arb_text(),
        any::<bool>(),
        prop::option::of(any::<u64>()),
        arb_due_date(),
    )
        .prop_map(|(id, text, completed, created_at, due_date)| Task {
            id,
            text,
            completed,
            created_at,
            due_date,
        })
}

/// Strategy for generating arbitrary `MutationOp` values.
fn arb_mutation_op() -> impl Strategy<Value = MutationOp> {
    prop_oneof![
        Just(MutationOp::Create),
        Just(MutationOp::Toggle),
        Just(MutationOp::Edit),
        Just(MutationOp::Delete),
    ]
}

/// Strategy for generating arbitrary `StoreMessage` values.
fn arb_store_message() -> impl Strategy<Value = StoreMessage> {
    prop_oneof![
        prop::option::of("[ -~]{1,64}").prop_map(|token| StoreMessage::Hello { token }),
        ("[ -~]{1,64}", "[ -~]{1,64}")
            .prop_map(|(identity, token)| StoreMessage::Welcome { identity, token }),
        Just(StoreMessage::Subscribe),
        prop::collection::vec(arb_task(), 0..8).prop_map(|tasks| StoreMessage::Snapshot { tasks }),
        (arb_text(), arb_due_date())
            .prop_map(|(text, due_date)| StoreMessage::Create { text, due_date }),
        arb_task_id().prop_map(|task_id| StoreMessage::Toggle { task_id }),
        (arb_task_id(), arb_text(), arb_due_date()).prop_map(|(task_id, text, due_date)| {
            StoreMessage::Edit {
                task_id,
                text,
                due_date,
            }
        }),
        arb_task_id().prop_map(|task_id| StoreMessage::Delete { task_id }),
        arb_mutation_op().prop_map(|op| StoreMessage::Ack { op }),
        "[ -~]{0,128}".prop_map(|reason| StoreMessage::Error { reason }),
    ]
}

// --- Property tests ---

proptest! {
    /// Any valid Task survives an encode → decode round-trip inside a snapshot.
    #[test]
    fn task_round_trip(task in arb_task()) {
        let msg = StoreMessage::Snapshot { tasks: vec![task] };
        let bytes = store::encode(&msg).expect("encode should succeed");
        let decoded = store::decode(&bytes).expect("decode should succeed");
        prop_assert_eq!(msg, decoded);
    }

    /// Any valid StoreMessage survives an encode → decode round-trip.
    #[test]
    fn store_message_round_trip(msg in arb_store_message()) {
        let bytes = store::encode(&msg).expect("encode should succeed");
        let decoded = store::decode(&bytes).expect("decode should succeed");
        prop_assert_eq!(msg, decoded);
    }

    /// Random bytes never panic the decoder; it returns Ok or Err gracefully.
    #[test]
    fn decode_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = store::decode(&bytes);
    }

    /// Truncating a valid encoding never panics the decoder.
    #[test]
    fn decode_truncated_encoding_never_panics(
        msg in arb_store_message(),
        keep in 0usize..64,
    ) {
        let bytes = store::encode(&msg).expect("encode should succeed");
        let truncated = &bytes[..keep.min(bytes.len())];
        let _ = store::decode(truncated);
    }
}
