//! Character-scanning sentence splitter.
//!
//! A sentence ends at the first of:
//!
//! - `.`, `!` or `?` immediately followed by a closing quote (the quote
//!   belongs to the sentence)
//! - `.`, `!`, `?` or `…` followed by whitespace or the end of the input (the
//!   whitespace starts the next sentence)
//! - any character other than `\n` immediately followed by `\n` (the newline
//!   belongs to the sentence)
//!
//! Each rule only applies once the sentence so far contains an alphabetic
//! character, so runs of punctuation, digits or blank lines never form a
//! sentence on their own. At most two characters are examined at a time.
//!
//! Sentences are contiguous, non-overlapping slices of the input:
//! `sentences.concat() + remainder == text`.

/// Output of [`split_sentences`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SentenceSplit<'a> {
    /// Complete sentences, in order
    pub sentences: Vec<&'a str>,
    /// Trailing text after the last complete sentence, possibly empty
    pub remainder: &'a str,
}

impl<'a> SentenceSplit<'a> {
    /// First complete sentence, if any.
    #[must_use]
    pub fn first(&self) -> Option<&'a str> {
        self.sentences.first().copied()
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closing_quote(c: char) -> bool {
    matches!(c, '"' | '\u{201D}')
}

/// Split text into complete sentences and an unfinished remainder.
pub fn split_sentences(text: &str) -> SentenceSplit<'_> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let offset = |i: usize| chars.get(i).map_or(text.len(), |&(pos, _)| pos);

    let mut sentences = Vec::new();
    let mut start = 0;
    let mut alpha = false;
    let mut i = 0;

    while let Some(&(_, a)) = chars.get(i) {
        let b = chars.get(i + 1).map(|&(_, c)| c);

        alpha |= a.is_alphabetic();

        let consumed = if !alpha {
            0
        } else if is_terminal(a) && b.is_some_and(is_closing_quote) {
            2
        } else if (is_terminal(a) || a == '\u{2026}') && b.is_none_or(char::is_whitespace) {
            1
        } else if a != '\n' && b == Some('\n') {
            2
        } else {
            0
        };

        if consumed == 0 {
            i += 1;
            continue;
        }

        i += consumed;
        let end = offset(i);
        sentences.push(&text[start..end]);
        start = end;
        alpha = false;
    }

    SentenceSplit { sentences, remainder: &text[start..] }
}
