//! Incremental stop-condition engine.
//!
//! Consumes generated fragments one at a time and decides how much of each
//! fragment is committed to the output. When a boundary of the selected kind
//! is crossed, the fragment is truncated exactly at the boundary and the
//! engine reports that generation should stop.
//!
//! # Boundaries
//!
//! - `Line`: the first `\n` that ends a non-empty line
//! - `Paragraph`: the first non-empty line followed by a run of whitespace
//!   containing at least one more `\n`; the boundary is after the last `\n`
//!   of that run
//! - `Sentence`: the end of the first complete sentence (see
//!   [`split_sentences`]), where the sentence may start in the prompt
//!
//! # Invariants
//!
//! - The concatenation of all emitted text equals [`output`] as long as no
//!   boundary truncates text already committed
//! - Once [`is_stopped`] is true, further pushes emit nothing
//! - `None` never stops
//!
//! [`output`]: StopConditionEngine::output
//! [`is_stopped`]: StopConditionEngine::is_stopped

use lineworks_proto::StopCondition;

use crate::sentence::split_sentences;

/// What to forward for one pushed fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    /// Text to forward as a stream response (possibly truncated or empty)
    pub next: String,
    /// Generation should stop after forwarding `next`
    pub stop: bool,
}

impl Emission {
    fn append(next: &str) -> Self {
        Self { next: next.to_owned(), stop: false }
    }

    fn stop(next: &str) -> Self {
        Self { next: next.to_owned(), stop: true }
    }
}

/// Per-generation stop-condition state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopConditionEngine {
    condition: StopCondition,
    output: String,
    stop_context: String,
    stopped: bool,
}

impl StopConditionEngine {
    /// Start a generation.
    ///
    /// In `Sentence` mode the unfinished last sentence of `prompt` becomes the
    /// stop context, so a sentence the prompt started is completed rather
    /// than cut at the first generated punctuation of a new one.
    pub fn new(condition: StopCondition, prompt: &str) -> Self {
        let stop_context = match condition {
            StopCondition::Sentence => split_sentences(prompt).remainder.to_owned(),
            StopCondition::None | StopCondition::Line | StopCondition::Paragraph => String::new(),
        };

        Self { condition, output: String::new(), stop_context, stopped: false }
    }

    /// Selected stop condition.
    pub fn condition(&self) -> StopCondition {
        self.condition
    }

    /// Text committed so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Prompt text still carried as sentence context.
    pub fn stop_context(&self) -> &str {
        &self.stop_context
    }

    /// True once a boundary has been found.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Consume the engine and return the committed text.
    pub fn into_output(self) -> String {
        self.output
    }

    /// Process one generated fragment.
    pub fn push(&mut self, next: &str) -> Emission {
        if self.stopped {
            return Emission::stop("");
        }

        match self.condition {
            StopCondition::None => {
                self.output.push_str(next);
                Emission::append(next)
            },
            StopCondition::Line => self.push_with(next, line_end),
            StopCondition::Paragraph => self.push_with(next, paragraph_end),
            StopCondition::Sentence => self.push_sentence(next),
        }
    }

    fn push_with(&mut self, next: &str, boundary: fn(&str) -> Option<usize>) -> Emission {
        let committed = self.output.len();
        self.output.push_str(next);

        let Some(end) = boundary(&self.output) else {
            return Emission::append(next);
        };

        let emitted = self.output.get(committed..end).unwrap_or("").to_owned();
        self.output.truncate(end);
        self.stopped = true;

        Emission { next: emitted, stop: true }
    }

    fn push_sentence(&mut self, next: &str) -> Emission {
        loop {
            let context_len = self.stop_context.len();
            let prefix_len = context_len + self.output.len();
            let joined = format!("{}{}{}", self.stop_context, self.output, next);

            let Some(first) = split_sentences(&joined).first() else {
                self.output.push_str(next);
                return Emission::append(next);
            };

            let generated = first.get(context_len..).unwrap_or("");
            if generated.trim().is_empty() {
                if context_len == 0 {
                    self.output.push_str(next);
                    return Emission::append(next);
                }
                // The prompt's own sentence was closed by whitespace only;
                // look for a sentence in the generated text alone.
                self.stop_context.clear();
                continue;
            }

            let emitted = first.get(prefix_len..).unwrap_or("").to_owned();
            self.output = generated.to_owned();
            self.stopped = true;

            return Emission { next: emitted, stop: true };
        }
    }
}

/// End offset (exclusive) of the first `\n` that terminates a non-empty line.
pub fn line_end(text: &str) -> Option<usize> {
    let mut previous = None;
    for (i, c) in text.char_indices() {
        if c == '\n' && previous.is_some_and(|p| p != '\n') {
            return Some(i + 1);
        }
        previous = Some(c);
    }
    None
}

/// End offset (exclusive) of the first paragraph break.
pub fn paragraph_end(text: &str) -> Option<usize> {
    let mut search = 0;
    while let Some(relative) = text.get(search..).and_then(line_end) {
        let line = search + relative;

        let last_newline = text[line..]
            .char_indices()
            .take_while(|&(_, c)| c.is_whitespace())
            .filter(|&(_, c)| c == '\n')
            .last()
            .map(|(i, _)| line + i);

        if let Some(newline) = last_newline {
            return Some(newline + 1);
        }
        search = line;
    }
    None
}
