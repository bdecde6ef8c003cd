//! Property-based tests for the stop-condition engine.
//!
//! Fragments are drawn from a small alphabet rich in boundary characters so
//! that every stop rule fires often.

use lineworks_core::{StopConditionEngine, split_sentences, stop};
use lineworks_proto::StopCondition;
use proptest::prelude::*;

fn fragments() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[ab \\n.!?\"\t]{0,6}", 0..24)
}

fn condition() -> impl Strategy<Value = StopCondition> {
    prop_oneof![
        Just(StopCondition::None),
        Just(StopCondition::Line),
        Just(StopCondition::Paragraph),
        Just(StopCondition::Sentence),
    ]
}

/// Push every fragment, returning what was emitted before the first stop.
fn drive(engine: &mut StopConditionEngine, fragments: &[String]) -> Vec<String> {
    let mut emitted = Vec::new();
    for fragment in fragments {
        let emission = engine.push(fragment);
        emitted.push(emission.next);
        if emission.stop {
            break;
        }
    }
    emitted
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn prop_none_passes_everything_through(fragments in fragments()) {
        let mut engine = StopConditionEngine::new(StopCondition::None, "");
        let emitted = drive(&mut engine, &fragments);

        // PROPERTY: nothing is truncated and nothing stops
        prop_assert_eq!(&emitted, &fragments);
        prop_assert!(!engine.is_stopped());
        prop_assert_eq!(engine.output(), fragments.concat());
    }

    #[test]
    fn prop_emitted_text_is_output(
        condition in condition(),
        prompt in "[ab .\\n]{0,12}",
        fragments in fragments(),
    ) {
        let mut engine = StopConditionEngine::new(condition, &prompt);
        let emitted = drive(&mut engine, &fragments);

        // PROPERTY: the stream responses add up to the final output
        prop_assert_eq!(emitted.concat(), engine.output());

        // PROPERTY: the output is a prefix of what the engine generated
        prop_assert!(fragments.concat().starts_with(engine.output()));
    }

    #[test]
    fn prop_nothing_after_stop(
        condition in condition(),
        fragments in fragments(),
        extra in "[ab \\n.]{1,6}",
    ) {
        let mut engine = StopConditionEngine::new(condition, "");
        drive(&mut engine, &fragments);
        if !engine.is_stopped() {
            return Ok(());
        }

        let before = engine.output().to_owned();
        let emission = engine.push(&extra);

        // PROPERTY: a stopped engine emits nothing and keeps its output
        prop_assert!(emission.stop);
        prop_assert!(emission.next.is_empty());
        prop_assert_eq!(engine.output(), before);
    }

    #[test]
    fn prop_line_stops_at_first_line_end(fragments in fragments()) {
        let mut engine = StopConditionEngine::new(StopCondition::Line, "");
        drive(&mut engine, &fragments);

        let all = fragments.concat();
        match stop::line_end(&all) {
            // PROPERTY: output ends exactly at the first line end
            Some(end) => {
                prop_assert!(engine.is_stopped());
                prop_assert_eq!(engine.output(), &all[..end]);
            },
            // PROPERTY: without a line end, nothing stops
            None => {
                prop_assert!(!engine.is_stopped());
                prop_assert_eq!(engine.output(), all);
            },
        }
    }

    #[test]
    fn prop_paragraph_stops_at_first_break(fragments in fragments()) {
        let mut engine = StopConditionEngine::new(StopCondition::Paragraph, "");
        drive(&mut engine, &fragments);

        // PROPERTY: a stopped output ends exactly at its own first break
        if engine.is_stopped() {
            prop_assert_eq!(stop::paragraph_end(engine.output()), Some(engine.output().len()));
        } else {
            prop_assert_eq!(stop::paragraph_end(engine.output()), None);
        }
    }

    #[test]
    fn prop_sentence_output_is_one_sentence(fragments in fragments()) {
        let mut engine = StopConditionEngine::new(StopCondition::Sentence, "");
        drive(&mut engine, &fragments);

        // PROPERTY: a stopped output is exactly one complete sentence
        if engine.is_stopped() {
            let split = split_sentences(engine.output());
            prop_assert_eq!(split.sentences.len(), 1);
            prop_assert_eq!(split.remainder, "");
        }
    }

    #[test]
    fn prop_split_is_lossless(text in "[ab \\n.!?\"\u{201D}\u{2026}]{0,40}") {
        let split = split_sentences(&text);

        // PROPERTY: sentences and remainder tile the input
        prop_assert_eq!(split.sentences.concat() + split.remainder, text.clone());

        // PROPERTY: every sentence contains a letter
        prop_assert!(split.sentences.iter().all(|s| s.chars().any(char::is_alphabetic)));
    }
}
