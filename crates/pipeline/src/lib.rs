//! Streaming text processing for model output
//!
//! - [`SentenceSegmenter`]: growing response text -> completed sentences
//! - [`IncrementalJsonDecoder`]: truncated judge JSON -> partial decision
//!
//! Both are synchronous and allocation-light; the turn dispatcher calls them
//! once per streamed token.

pub mod json;
pub mod sentence;

pub use json::{repair, IncrementalJsonDecoder, RepairedJson};
pub use sentence::{SentenceSegmenter, Sentences, TERMINATORS};
