//! Motion tag extraction for chat-with-motion completions
//!
//! In that mode the model is asked to open its reply with `[motion:<name>]`.
//! The filter holds back leading tokens until the tag is either complete or
//! ruled out, then reports the motion out of band and forwards the rest of
//! the text unchanged.

use robot_chat_core::StreamEvent;

const TAG_OPEN: &str = "[motion:";
const TAG_CLOSE: char = ']';
/// Give up on a tag that has not closed within this many bytes
const MAX_TAG_LEN: usize = 64;

#[derive(Debug)]
enum State {
    Detecting(String),
    Passthrough,
}

/// Splits a leading `[motion:<name>]` tag off a token stream
#[derive(Debug)]
pub struct MotionTagFilter {
    state: State,
}

impl Default for MotionTagFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionTagFilter {
    pub fn new() -> Self {
        Self {
            state: State::Detecting(String::new()),
        }
    }

    /// Feed one token, returning the events it releases
    pub fn push(&mut self, token: &str) -> Vec<StreamEvent> {
        let buffer = match &mut self.state {
            State::Passthrough => return vec![StreamEvent::Token(token.to_string())],
            State::Detecting(buffer) => {
                buffer.push_str(token);
                buffer
            }
        };

        let head = buffer.trim_start();
        if head.is_empty() {
            return Vec::new();
        }

        if let Some(tag_body) = head.strip_prefix(TAG_OPEN) {
            if let Some(close) = tag_body.find(TAG_CLOSE) {
                let name = tag_body[..close].trim().to_string();
                let rest = tag_body[close + TAG_CLOSE.len_utf8()..].trim_start().to_string();
                self.state = State::Passthrough;

                let mut events = Vec::with_capacity(2);
                if !name.is_empty() {
                    events.push(StreamEvent::Motion(name));
                }
                if !rest.is_empty() {
                    events.push(StreamEvent::Token(rest));
                }
                return events;
            }
            if head.len() <= MAX_TAG_LEN {
                return Vec::new();
            }
        } else if TAG_OPEN.starts_with(head) {
            return Vec::new();
        }

        let text = std::mem::take(buffer);
        self.state = State::Passthrough;
        vec![StreamEvent::Token(text)]
    }

    /// Release text still held back when the stream ends
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        match std::mem::replace(&mut self.state, State::Passthrough) {
            State::Detecting(buffer) if !buffer.trim().is_empty() => {
                vec![StreamEvent::Token(buffer)]
            }
            _ => Vec::new(),
        }
    }
}
