//! Sentence segmenter for streaming model output
//!
//! Takes the full response text seen so far and yields each sentence once,
//! as soon as its terminator arrives. Text after the last terminator stays
//! buffered until a later call completes it.

/// Sentence terminators, ASCII and full-width
pub const TERMINATORS: &[char] = &['。', '．', '.', '！', '!', '？', '?'];

fn is_terminator(c: char) -> bool {
    TERMINATORS.contains(&c)
}

/// Splits a growing response into sentences without re-emitting text
#[derive(Debug, Default, Clone)]
pub struct SentenceSegmenter {
    text: String,
    /// Byte offset into `text` of the first character not yet emitted
    emitted_up_to: usize,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the known text with `full_text` and yield completed sentences.
    ///
    /// `full_text` must extend the text already emitted. If it does not, the
    /// call yields nothing and the segmenter keeps its state.
    pub fn advance(&mut self, full_text: &str) -> Sentences<'_> {
        if full_text.starts_with(&self.text[..self.emitted_up_to]) {
            self.text.clear();
            self.text.push_str(full_text);
        } else {
            tracing::trace!(
                emitted = self.emitted_up_to,
                "Ignoring text that does not extend the emitted prefix"
            );
        }
        Sentences { segmenter: self }
    }

    /// Append a chunk and yield completed sentences
    pub fn push(&mut self, chunk: &str) -> Sentences<'_> {
        self.text.push_str(chunk);
        Sentences { segmenter: self }
    }

    /// Take the unterminated remainder, if any, as a final sentence
    pub fn flush(&mut self) -> Option<String> {
        let rest = &self.text[self.emitted_up_to..];
        if rest.is_empty() {
            return None;
        }
        let rest = rest.to_string();
        self.emitted_up_to = self.text.len();
        Some(rest)
    }

    /// Bytes of text already emitted
    pub fn emitted_len(&self) -> usize {
        self.emitted_up_to
    }

    /// Text received but not yet emitted
    pub fn pending(&self) -> &str {
        &self.text[self.emitted_up_to..]
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.emitted_up_to = 0;
    }

    fn next_sentence(&mut self) -> Option<String> {
        let rest = &self.text[self.emitted_up_to..];
        let (idx, c) = rest.char_indices().find(|&(_, c)| is_terminator(c))?;
        let end = self.emitted_up_to + idx + c.len_utf8();
        let sentence = self.text[self.emitted_up_to..end].to_string();
        self.emitted_up_to = end;
        Some(sentence)
    }
}

/// Lazy sequence of sentences completed by one `advance` or `push` call.
///
/// Each sentence is marked emitted only when the iterator yields it, so
/// dropping the iterator early leaves the rest for the next call.
pub struct Sentences<'a> {
    segmenter: &'a mut SentenceSegmenter,
}

impl Iterator for Sentences<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.segmenter.next_sentence()
    }
}
