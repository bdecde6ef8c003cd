//! Fuzz target for the stop-condition engine
//!
//! Drives the engine with arbitrary prompts and fragment sequences under
//! every stop condition.
//!
//! # Invariants
//!
//! - Pushing never panics, including on multi-byte characters at fragment
//!   edges
//! - Emitted text concatenates to the committed output
//! - The output is a prefix of everything generated
//! - Once stopped, nothing more is emitted

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lineworks_core::StopConditionEngine;
use lineworks_proto::StopCondition;

#[derive(Debug, Arbitrary)]
enum Condition {
    None,
    Line,
    Paragraph,
    Sentence,
}

#[derive(Debug, Arbitrary)]
struct Input {
    condition: Condition,
    prompt: String,
    fragments: Vec<String>,
}

fuzz_target!(|input: Input| {
    let condition = match input.condition {
        Condition::None => StopCondition::None,
        Condition::Line => StopCondition::Line,
        Condition::Paragraph => StopCondition::Paragraph,
        Condition::Sentence => StopCondition::Sentence,
    };

    let mut engine = StopConditionEngine::new(condition, &input.prompt);
    let mut emitted = String::new();
    let mut pushed = String::new();

    for fragment in &input.fragments {
        let was_stopped = engine.is_stopped();
        let emission = engine.push(fragment);

        if was_stopped {
            assert!(emission.stop && emission.next.is_empty());
            continue;
        }

        pushed.push_str(fragment);
        emitted.push_str(&emission.next);
    }

    assert_eq!(emitted, engine.output());
    assert!(pushed.starts_with(engine.output()));
});
