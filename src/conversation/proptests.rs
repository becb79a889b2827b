//! Property-based tests for the conversation store
//!
//! Random operation sequences, including patches to ids that were cleared
//! away, must never leave more than one message streaming.

use super::*;
use crate::calculation::CalculationResult;
use proptest::prelude::*;
use serde_json::{Map, Value};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_calculation() -> impl Strategy<Value = CalculationResult> {
    proptest::collection::btree_map("[a-d]", 0i64..100, 1..4).prop_map(|fields| {
        let map: Map<String, Value> = fields
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect();
        CalculationResult::from(map)
    })
}

fn arb_suggestions() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z ?]{1,12}", 0..4)
}

/// Store operations; ids are picked by index into every id handed out so far
#[derive(Debug, Clone)]
enum Op {
    AddUser(String),
    AddAssistant { streaming: bool },
    Update { pick: usize, content: String, streaming: bool },
    Calculation(CalculationResult),
    Suggestions(Vec<String>),
    Clear,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => "[a-z ]{1,10}".prop_map(Op::AddUser),
        2 => any::<bool>().prop_map(|streaming| Op::AddAssistant { streaming }),
        4 => (any::<usize>(), "[a-z ]{0,10}", any::<bool>())
            .prop_map(|(pick, content, streaming)| Op::Update { pick, content, streaming }),
        2 => arb_calculation().prop_map(Op::Calculation),
        1 => arb_suggestions().prop_map(Op::Suggestions),
        1 => Just(Op::Clear),
    ]
}

fn apply(store: &mut ConversationStore, issued: &mut Vec<MessageId>, op: Op) {
    match op {
        Op::AddUser(text) => issued.push(store.add_message(NewMessage::user(text))),
        Op::AddAssistant { streaming } => {
            issued.push(store.add_message(NewMessage::assistant("").streaming(streaming)));
        }
        Op::Update {
            pick,
            content,
            streaming,
        } => {
            if !issued.is_empty() {
                let id = issued[pick % issued.len()].clone();
                store.update_last_message(&id, &content, streaming);
            }
        }
        Op::Calculation(result) => {
            store.add_calculation_result(result);
        }
        Op::Suggestions(suggestions) => store.add_follow_up_suggestions(suggestions),
        Op::Clear => store.clear_conversation(),
    }
}

fn streaming_count(store: &ConversationStore) -> usize {
    store.messages().iter().filter(|m| m.is_streaming).count()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_at_most_one_streaming_message(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut store = ConversationStore::new();
        let mut issued = Vec::new();
        for op in ops {
            apply(&mut store, &mut issued, op);
            prop_assert!(streaming_count(&store) <= 1);
        }
    }

    #[test]
    fn prop_patch_to_missing_id_changes_nothing(
        ops in proptest::collection::vec(arb_op(), 0..20),
        content in "[a-z ]{0,10}",
        streaming in any::<bool>(),
    ) {
        let mut store = ConversationStore::new();
        let mut issued = Vec::new();
        for op in ops {
            apply(&mut store, &mut issued, op);
        }

        let before = store.state().clone();
        let stranger = MessageId::from("not-a-real-id");
        prop_assert!(!store.update_last_message(&stranger, &content, streaming));
        prop_assert!(!store.set_rich_content(&stranger, vec![]));
        prop_assert_eq!(store.state(), &before);
    }

    #[test]
    fn prop_calculation_merge_is_last_write_wins(
        results in proptest::collection::vec(arb_calculation(), 1..6),
    ) {
        let mut store = ConversationStore::new();
        let id = store.add_message(NewMessage::assistant_placeholder());

        let mut expected = Map::new();
        for result in &results {
            for (key, value) in result.as_map() {
                expected.insert(key.clone(), value.clone());
            }
            store.add_calculation_result(result.clone());
        }

        let merged = store.get(&id).and_then(|m| m.calculation_result.clone());
        prop_assert_eq!(merged, Some(CalculationResult::from(expected)));
        prop_assert_eq!(store.last_calculation(), results.last());
    }

    #[test]
    fn prop_suggestions_are_replaced_not_appended(
        batches in proptest::collection::vec(arb_suggestions(), 1..6),
    ) {
        let mut store = ConversationStore::new();
        for batch in &batches {
            store.add_follow_up_suggestions(batch.clone());
        }
        prop_assert_eq!(store.suggested_follow_ups(), batches[batches.len() - 1].as_slice());
    }

    #[test]
    fn prop_finalized_content_never_changes(
        ops in proptest::collection::vec(arb_op(), 0..30),
    ) {
        let mut store = ConversationStore::new();
        let mut issued = Vec::new();
        let mut finalized: Vec<(MessageId, String)> = Vec::new();
        for op in ops {
            apply(&mut store, &mut issued, op);
            for (id, content) in &finalized {
                if let Some(message) = store.get(id) {
                    prop_assert_eq!(&message.content, content);
                }
            }
            finalized = store
                .messages()
                .iter()
                .filter(|m| !m.is_streaming)
                .map(|m| (m.id.clone(), m.content.clone()))
                .collect();
        }
    }
}
