//! Scripted collaborators shared by the agent integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;

use robot_chat_core::{
    ChatModel, ChatRequest, ChatStream, Error, Frame, MotionCommand, MotionDispatcher, Result,
    SpeechDispatcher, StreamEvent,
};

/// What the next `stream_chat` call does
pub enum Script {
    Events(Vec<StreamEvent>),
    FailOpen,
    Stream(ChatStream),
}

pub fn tokens(tokens: &[&str]) -> Script {
    Script::Events(
        tokens
            .iter()
            .map(|t| StreamEvent::Token(t.to_string()))
            .collect(),
    )
}

/// Chat model replaying queued scripts and recording every request
#[derive(Default)]
pub struct ScriptedModel {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream> {
        self.requests.lock().push(request);
        let script = self.scripts.lock().pop_front();
        match script {
            Some(Script::Events(events)) => {
                Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
            }
            Some(Script::Stream(stream)) => Ok(stream),
            Some(Script::FailOpen) => Err(Error::Llm("HTTP 503: unavailable".to_string())),
            None => Err(Error::Llm("no script left".to_string())),
        }
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Speak(String),
    PlayFlag(bool),
    Motion(String),
}

/// Speech and motion service recording calls in the order they arrive
#[derive(Default)]
pub struct Recorder {
    actions: Mutex<Vec<Action>>,
    fail_speech: bool,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_speech() -> Arc<Self> {
        Arc::new(Self {
            actions: Mutex::new(Vec::new()),
            fail_speech: true,
        })
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.actions
            .lock()
            .iter()
            .filter_map(|a| match a {
                Action::Speak(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn motions(&self) -> Vec<String> {
        self.actions
            .lock()
            .iter()
            .filter_map(|a| match a {
                Action::Motion(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SpeechDispatcher for Recorder {
    async fn set_text(&self, sentence: &str) -> Result<()> {
        if self.fail_speech {
            return Err(Error::Speech("connection refused".to_string()));
        }
        self.actions.lock().push(Action::Speak(sentence.to_string()));
        Ok(())
    }

    async fn set_play_flag(&self, enabled: bool) -> Result<()> {
        self.actions.lock().push(Action::PlayFlag(enabled));
        Ok(())
    }
}

#[async_trait]
impl MotionDispatcher for Recorder {
    async fn set_motion(&self, command: &MotionCommand) -> Result<()> {
        self.actions.lock().push(Action::Motion(command.name.clone()));
        Ok(())
    }
}

/// Solid-colour PNG frame
pub fn png_frame(width: u32, height: u32) -> Frame {
    let img = RgbImage::from_pixel(width, height, Rgb([120, 80, 40]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    Frame::new(width, height, buf.into_inner())
}
