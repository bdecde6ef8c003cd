//! Checks over recorded response sequences.
//!
//! A generate request produces a sequence shaped like
//!
//! ```text
//! status("generating") stream* output (done | aborted)
//! ```
//!
//! or, when the engine fails, `status* stream* error`. [`check_generation`]
//! verifies the properties every such sequence must have, so tests assert
//! on behavior instead of exact message lists.

use std::fmt;

use lineworks_proto::{OutputData, Response};

/// A response sequence that broke one of the generation rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Name of the broken rule.
    pub rule: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl Violation {
    fn new(rule: &'static str, message: impl Into<String>) -> Self {
        Self { rule, message: message.into() }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule, self.message)
    }
}

impl std::error::Error for Violation {}

/// Read-only view over a recorded response sequence.
#[derive(Debug, Clone, Copy)]
pub struct Transcript<'a> {
    responses: &'a [Response],
}

impl<'a> Transcript<'a> {
    /// View `responses`.
    pub fn new(responses: &'a [Response]) -> Self {
        Self { responses }
    }

    /// Status messages, in order.
    pub fn statuses(&self) -> Vec<&'a str> {
        self.responses
            .iter()
            .filter_map(|r| match r {
                Response::Status { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Streamed fragments, in order.
    pub fn streamed(&self) -> Vec<&'a str> {
        self.responses
            .iter()
            .filter_map(|r| match r {
                Response::Stream { next } => Some(next.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Concatenation of every streamed fragment.
    pub fn streamed_text(&self) -> String {
        self.streamed().concat()
    }

    /// The output response, if any.
    pub fn output(&self) -> Option<&'a OutputData> {
        self.responses.iter().find_map(|r| match r {
            Response::Output(data) => Some(data),
            _ => None,
        })
    }

    /// The last terminal response, if any.
    pub fn terminal(&self) -> Option<&'a Response> {
        self.responses.iter().rev().find(|r| r.is_terminal())
    }

    /// Error messages, in order.
    pub fn errors(&self) -> Vec<&'a str> {
        self.responses
            .iter()
            .filter_map(|r| match r {
                Response::Error { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Verify the rules every generate response sequence follows.
///
/// # Errors
///
/// Returns the first [`Violation`] found:
///
/// - `single-terminal`: not exactly one terminal response, or it is not last
/// - `output-before-terminal`: `done`/`aborted` without an output right
///   before it, or an `errored` flag that disagrees with the terminal
/// - `no-output-on-error`: an output followed by an error
/// - `output-matches-stream`: output text differs from the streamed text
pub fn check_generation(responses: &[Response]) -> Result<(), Violation> {
    let terminals = responses.iter().filter(|r| r.is_terminal()).count();
    if terminals != 1 {
        return Err(Violation::new(
            "single-terminal",
            format!("expected 1 terminal response, found {terminals}"),
        ));
    }

    let Some((last, rest)) = responses.split_last() else {
        return Err(Violation::new("single-terminal", "empty sequence"));
    };
    if !last.is_terminal() {
        return Err(Violation::new(
            "single-terminal",
            format!("sequence ends with {}", last.kind()),
        ));
    }

    let transcript = Transcript::new(responses);
    match last {
        Response::Done | Response::Aborted => {
            let Some(Response::Output(output)) = rest.last() else {
                return Err(Violation::new(
                    "output-before-terminal",
                    format!("{} is not preceded by output", last.kind()),
                ));
            };

            let aborted = matches!(last, Response::Aborted);
            if output.errored != aborted {
                return Err(Violation::new(
                    "output-before-terminal",
                    format!("errored = {} but terminal is {}", output.errored, last.kind()),
                ));
            }

            let streamed = transcript.streamed_text();
            if output.output != streamed {
                return Err(Violation::new(
                    "output-matches-stream",
                    format!("output {:?} != streamed {streamed:?}", output.output),
                ));
            }
        },
        _ => {
            if transcript.output().is_some() {
                return Err(Violation::new("no-output-on-error", "output sent before error"));
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use lineworks_proto::{GenerateParams, LoadParams};

    use super::*;

    fn output(text: &str, errored: bool) -> Response {
        Response::Output(OutputData {
            parameters: GenerateParams::new("p"),
            model: LoadParams::new("tiny"),
            output: text.into(),
            errored,
        })
    }

    #[test]
    fn completed_generation_passes() {
        let responses = vec![
            Response::status("generating"),
            Response::stream("a"),
            Response::stream("b"),
            output("ab", false),
            Response::Done,
        ];

        assert_eq!(check_generation(&responses), Ok(()));
        let transcript = Transcript::new(&responses);
        assert_eq!(transcript.statuses(), vec!["generating"]);
        assert_eq!(transcript.streamed_text(), "ab");
        assert_eq!(transcript.terminal(), Some(&Response::Done));
    }

    #[test]
    fn aborted_requires_errored_flag() {
        let responses = vec![Response::stream("a"), output("a", false), Response::Aborted];

        let violation = check_generation(&responses).unwrap_err();
        assert_eq!(violation.rule, "output-before-terminal");
    }

    #[test]
    fn error_after_output_is_rejected() {
        let responses = vec![output("", false), Response::error("boom")];

        let violation = check_generation(&responses).unwrap_err();
        assert_eq!(violation.rule, "no-output-on-error");
    }

    #[test]
    fn two_terminals_are_rejected() {
        let responses = vec![output("", false), Response::Done, Response::Done];

        let violation = check_generation(&responses).unwrap_err();
        assert_eq!(violation.rule, "single-terminal");
    }

    #[test]
    fn output_must_match_stream() {
        let responses = vec![Response::stream("a"), output("ab", false), Response::Done];

        let violation = check_generation(&responses).unwrap_err();
        assert_eq!(violation.rule, "output-matches-stream");
    }
}
