//! Property-based tests for frame decoding
//!
//! However the body is split into network reads, the decoder must produce
//! the same frames in the same order, and the text deltas must concatenate
//! to exactly the text the server sent.

use super::decoder::{FrameDecoder, FrameFormat};
use super::types::StreamFrame;
use crate::calculation::CalculationResult;
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Strategies
// ============================================================================

/// Text deltas, including multi-byte characters and JSON-looking punctuation
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,%$:!?\u{e9}\u{1f3e0}\"{}\\n]{1,24}"
}

fn arb_calculation() -> impl Strategy<Value = CalculationResult> {
    prop_oneof![
        (0u32..800).prop_map(|tenths| json!({"dti": f64::from(tenths) / 10.0})),
        (0u32..100).prop_map(|score| json!({"readiness_score": score, "level": "Getting Ready"})),
        (100_000u32..900_000, any::<bool>())
            .prop_map(|(price, ok)| json!({"home_price": price, "is_affordable": ok})),
    ]
    .prop_map(|v| CalculationResult::from_value(v).unwrap())
}

fn arb_frame() -> impl Strategy<Value = StreamFrame> {
    prop_oneof![
        4 => arb_text().prop_map(StreamFrame::Text),
        2 => arb_calculation().prop_map(StreamFrame::Calculation),
        1 => proptest::collection::vec("[a-zA-Z ?]{1,20}", 0..3).prop_map(StreamFrame::Suggestions),
    ]
}

/// Text the backend writes straight into `data:` lines, without a JSON envelope
///
/// Whitespace-only deltas and embedded newlines included; no `{` or `[` so it
/// can never look like a structured frame or `[DONE]`.
fn arb_raw_text() -> impl Strategy<Value = String> {
    prop_oneof![
        1 => Just(" ".to_string()),
        1 => Just("\n".to_string()),
        6 => "[a-zA-Z0-9 .,%$:!?\u{e9}\u{1f3e0}\n]{1,24}",
    ]
}

/// One line per `data:` field, so a newline inside the text spans two lines
fn raw_sse(text: &str) -> String {
    let mut out: String = text.split('\n').map(|line| format!("data: {line}\n")).collect();
    out.push('\n');
    out
}

/// A frame together with its encoding on the wire
fn arb_encoded_frame() -> impl Strategy<Value = (StreamFrame, String)> {
    prop_oneof![
        3 => arb_frame().prop_map(|frame| {
            let sse = frame.to_sse();
            (frame, sse)
        }),
        2 => arb_raw_text().prop_map(|text| {
            let sse = raw_sse(&text);
            (StreamFrame::Text(text), sse)
        }),
    ]
}

/// A body plus a set of cut points to split it into reads
fn arb_split_body() -> impl Strategy<Value = (Vec<StreamFrame>, Vec<u8>, Vec<usize>)> {
    proptest::collection::vec(arb_encoded_frame(), 0..12).prop_flat_map(|encoded| {
        let body: Vec<u8> = encoded
            .iter()
            .map(|(_, sse)| sse.as_str())
            .collect::<String>()
            .into_bytes();
        let frames: Vec<StreamFrame> = encoded.into_iter().map(|(frame, _)| frame).collect();
        let len = body.len();
        (
            Just(frames),
            Just(body),
            proptest::collection::vec(0..=len, 0..8),
        )
    })
}

fn decode_in_pieces(body: &[u8], mut cuts: Vec<usize>) -> Vec<StreamFrame> {
    cuts.sort_unstable();
    cuts.dedup();

    let mut decoder = FrameDecoder::new(FrameFormat::EventStream);
    let mut frames = Vec::new();
    let mut start = 0;
    for cut in cuts.into_iter().chain(std::iter::once(body.len())) {
        frames.extend(decoder.push(&body[start..cut]));
        start = cut;
    }
    frames.extend(decoder.finish());
    frames
        .into_iter()
        .map(|f| f.expect("well-formed frame failed to decode"))
        .collect()
}

fn text_of(frames: &[StreamFrame]) -> String {
    frames
        .iter()
        .filter_map(|f| match f {
            StreamFrame::Text(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_chunking_does_not_change_frames((frames, body, cuts) in arb_split_body()) {
        let decoded = decode_in_pieces(&body, cuts);
        prop_assert_eq!(decoded, frames);
    }

    #[test]
    fn prop_text_deltas_concatenate_to_sent_text((frames, body, cuts) in arb_split_body()) {
        let decoded = decode_in_pieces(&body, cuts);
        prop_assert_eq!(text_of(&decoded), text_of(&frames));
    }

    #[test]
    fn prop_garbage_frame_never_hides_neighbours(
        before in arb_text(),
        after in arb_text(),
        garbage in "\\{[a-z\":, ]{0,20}",
    ) {
        let body = format!(
            "{}data: {}\n\n{}",
            StreamFrame::Text(before.clone()).to_sse(),
            garbage,
            StreamFrame::Text(after.clone()).to_sse(),
        );

        let mut decoder = FrameDecoder::new(FrameFormat::EventStream);
        let mut frames = decoder.push(body.as_bytes());
        frames.extend(decoder.finish());
        let texts: Vec<String> = frames
            .into_iter()
            .filter_map(|f| match f {
                Ok(StreamFrame::Text(t)) => Some(t),
                _ => None,
            })
            .collect();

        prop_assert_eq!(texts, vec![before, after]);
    }
}
