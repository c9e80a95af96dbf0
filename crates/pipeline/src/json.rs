//! Tolerant decoder for the judge model's streamed JSON
//!
//! The judge answers with one object such as
//! `{"vision": "0", "motion": "nod", "talk": "はい。"}`, delivered token by
//! token. Until the closing brace arrives the buffer is not valid JSON, so the
//! decoder first tries a strict parse and otherwise repairs the truncation
//! (open string, missing value, trailing comma, unclosed containers) to read
//! the `talk` prefix seen so far.
//!
//! While tokens are still arriving the vision flag is only trusted from a
//! strict parse: a repaired buffer reports `vision_requested = false`. Once
//! the stream has ended, [`IncrementalJsonDecoder::decode_final`] reads the
//! flag from the repaired object as well, so an answer cut off before its
//! closing brace can still ask for the camera.

use robot_chat_core::StreamedDecision;
use serde_json::{Map, Value};

/// Decodes partial judge output into a [`StreamedDecision`]
#[derive(Debug, Clone)]
pub struct IncrementalJsonDecoder {
    vision_key: String,
    talk_key: String,
    motion_key: String,
}

impl Default for IncrementalJsonDecoder {
    fn default() -> Self {
        Self::new("vision", "talk", "motion")
    }
}

impl IncrementalJsonDecoder {
    pub fn new(
        vision_key: impl Into<String>,
        talk_key: impl Into<String>,
        motion_key: impl Into<String>,
    ) -> Self {
        Self {
            vision_key: vision_key.into(),
            talk_key: talk_key.into(),
            motion_key: motion_key.into(),
        }
    }

    /// Best available reading of `buffer`, or `None` if no object can be
    /// recovered yet. Never fails on malformed input.
    pub fn decode(&self, buffer: &str) -> Option<StreamedDecision> {
        self.read(buffer, false)
    }

    /// Reading of the complete judge output after the stream has ended.
    ///
    /// Same as [`decode`](Self::decode), except that a repaired object's
    /// vision flag counts unless its own value was the one cut off.
    pub fn decode_final(&self, buffer: &str) -> Option<StreamedDecision> {
        self.read(buffer, true)
    }

    fn read(&self, buffer: &str, ended: bool) -> Option<StreamedDecision> {
        let start = buffer.find('{')?;
        let candidate = &buffer[start..];

        let mut values = serde_json::Deserializer::from_str(candidate).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = values.next() {
            return Some(self.from_complete(&map));
        }

        let repaired = repair(candidate)?;
        match serde_json::from_str::<Value>(&repaired.text) {
            Ok(Value::Object(map)) => {
                let truncated_key = repaired.truncated_key.as_deref();
                let mut decision = self.from_partial(&map, truncated_key);
                if ended && truncated_key != Some(self.vision_key.as_str()) {
                    decision.vision_requested = map.get(&self.vision_key).map(flag).unwrap_or(false);
                }
                Some(decision)
            }
            _ => None,
        }
    }

    fn from_complete(&self, map: &Map<String, Value>) -> StreamedDecision {
        StreamedDecision {
            vision_requested: map.get(&self.vision_key).map(flag).unwrap_or(false),
            talk_so_far: self.talk(map),
            motion: self.motion(map),
        }
    }

    fn from_partial(&self, map: &Map<String, Value>, truncated_key: Option<&str>) -> StreamedDecision {
        let motion = if truncated_key == Some(self.motion_key.as_str()) {
            None
        } else {
            self.motion(map)
        };

        StreamedDecision {
            vision_requested: false,
            talk_so_far: self.talk(map),
            motion,
        }
    }

    fn talk(&self, map: &Map<String, Value>) -> String {
        match map.get(&self.talk_key) {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    fn motion(&self, map: &Map<String, Value>) -> Option<String> {
        match map.get(&self.motion_key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }
}

/// Boolean-like flag: `"1"`, `"true"`, `true`, or a non-zero number
fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true"),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Result of closing a truncated JSON buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairedJson {
    pub text: String,
    /// Top-level key whose string value was cut off and closed by the repair
    pub truncated_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectState {
    /// After `{`
    KeyOrEnd,
    /// After `,`
    Key,
    Colon,
    Value,
    CommaOrEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    /// After `[`
    ValueOrEnd,
    /// After `,`
    Value,
    CommaOrEnd,
}

#[derive(Debug, Clone, Copy)]
enum Container {
    Object(ObjectState),
    Array(ArrayState),
}

#[derive(Default)]
struct Scanner {
    stack: Vec<Container>,
    in_string: bool,
    is_key: bool,
    string_start: usize,
    /// Byte offset of a `\` whose escape sequence is not complete yet
    escape_start: Option<usize>,
    unicode_remaining: u8,
    literal_start: Option<usize>,
    last_key: Option<(usize, String)>,
}

impl Scanner {
    fn begin_value(&mut self) {
        match self.stack.last_mut() {
            Some(Container::Object(state)) => *state = ObjectState::CommaOrEnd,
            Some(Container::Array(state)) => *state = ArrayState::CommaOrEnd,
            None => {}
        }
    }

    fn expects_key(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Container::Object(ObjectState::KeyOrEnd | ObjectState::Key))
        )
    }
}

/// Close a JSON buffer that was cut off mid-stream.
///
/// `buffer` must start at the opening `{` or `[`. Returns `None` when the
/// buffer holds no container at all.
pub fn repair(buffer: &str) -> Option<RepairedJson> {
    let mut sc = Scanner::default();
    let mut root_end = None;

    for (idx, c) in buffer.char_indices() {
        if sc.in_string {
            if sc.unicode_remaining > 0 {
                sc.unicode_remaining -= 1;
                if sc.unicode_remaining == 0 {
                    sc.escape_start = None;
                }
                continue;
            }
            if sc.escape_start.is_some() {
                if c == 'u' {
                    sc.unicode_remaining = 4;
                } else {
                    sc.escape_start = None;
                }
                continue;
            }
            match c {
                '\\' => sc.escape_start = Some(idx),
                '"' => {
                    sc.in_string = false;
                    if sc.is_key {
                        let key = buffer[sc.string_start + 1..idx].to_string();
                        sc.last_key = Some((sc.stack.len(), key));
                        if let Some(Container::Object(state)) = sc.stack.last_mut() {
                            *state = ObjectState::Colon;
                        }
                    }
                }
                _ => {}
            }
            continue;
        }

        if sc.literal_start.is_some() && (c.is_whitespace() || "{}[],:\"".contains(c)) {
            sc.literal_start = None;
        }

        match c {
            c if c.is_whitespace() => {}
            '{' => {
                sc.begin_value();
                sc.stack.push(Container::Object(ObjectState::KeyOrEnd));
            }
            '[' => {
                sc.begin_value();
                sc.stack.push(Container::Array(ArrayState::ValueOrEnd));
            }
            '}' | ']' => {
                sc.stack.pop();
                if sc.stack.is_empty() {
                    root_end = Some(idx + c.len_utf8());
                    break;
                }
            }
            '"' => {
                sc.is_key = sc.expects_key();
                if !sc.is_key {
                    sc.begin_value();
                }
                sc.in_string = true;
                sc.string_start = idx;
            }
            ':' => {
                if let Some(Container::Object(state)) = sc.stack.last_mut() {
                    *state = ObjectState::Value;
                }
            }
            ',' => match sc.stack.last_mut() {
                Some(Container::Object(state)) => *state = ObjectState::Key,
                Some(Container::Array(state)) => *state = ArrayState::Value,
                None => {}
            },
            _ => {
                if sc.literal_start.is_none() {
                    sc.begin_value();
                    sc.literal_start = Some(idx);
                }
            }
        }
    }

    if let Some(end) = root_end {
        return Some(RepairedJson {
            text: buffer[..end].to_string(),
            truncated_key: None,
        });
    }
    if sc.stack.is_empty() {
        return None;
    }

    let mut text = buffer.to_string();
    let mut truncated_key = None;

    if sc.in_string {
        if let Some(start) = sc.escape_start {
            text.truncate(start);
        }
        text.push('"');
        if sc.is_key {
            text.push_str(":null");
        } else if let Some((depth, key)) = sc.last_key.take() {
            if depth == 1 && sc.stack.len() == 1 {
                truncated_key = Some(key);
            }
        }
    } else if let Some(start) = sc.literal_start {
        if serde_json::from_str::<Value>(&buffer[start..]).is_err() {
            text.truncate(start);
            text.push_str("null");
        }
    } else {
        let trimmed_len = text.trim_end().len();
        text.truncate(trimmed_len);
        match sc.stack.last() {
            Some(Container::Object(ObjectState::Colon)) => text.push_str(":null"),
            Some(Container::Object(ObjectState::Value)) => text.push_str("null"),
            Some(Container::Object(ObjectState::Key))
            | Some(Container::Array(ArrayState::Value)) => {
                if text.ends_with(',') {
                    text.pop();
                }
            }
            _ => {}
        }
    }

    for container in sc.stack.iter().rev() {
        match container {
            Container::Object(_) => text.push('}'),
            Container::Array(_) => text.push(']'),
        }
    }

    Some(RepairedJson {
        text,
        truncated_key,
    })
}
