//! Conversation messages

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::Frame;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message, optionally carrying an image for vision models
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub image: Option<Frame>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            image: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// User message with an attached image
    pub fn vision(content: impl Into<String>, image: Frame) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            image: Some(image),
        }
    }

    /// Same message without the image payload
    pub fn without_image(&self) -> Self {
        Self {
            role: self.role,
            content: self.content.clone(),
            image: None,
        }
    }
}
