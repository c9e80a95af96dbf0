//! Engagement loop
//!
//! Pulls frames from the detection source, keeps the latest one for turns,
//! runs the engagement tracker and starts or cancels greetings.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use robot_chat_core::{DetectionSource, TrackedFrame};

use crate::engagement::{EngagementEvent, EngagementState, EngagementTracker};
use crate::frame_store::FrameStore;
use crate::greeting::Greeter;

struct ActiveGreeting {
    engaged_id: i64,
    cancel: CancellationToken,
}

pub struct EngagementLoop {
    tracker: EngagementTracker,
    frames: Arc<FrameStore>,
    greeter: Option<Arc<Greeter>>,
    greeting: Option<ActiveGreeting>,
    status: watch::Sender<EngagementState>,
    shutdown: CancellationToken,
}

impl EngagementLoop {
    pub fn new(tracker: EngagementTracker, frames: Arc<FrameStore>, shutdown: CancellationToken) -> Self {
        Self {
            tracker,
            frames,
            greeter: None,
            greeting: None,
            status: watch::channel(EngagementState::Idle).0,
            shutdown,
        }
    }

    /// Follow the engagement state from outside the loop
    pub fn subscribe(&self) -> watch::Receiver<EngagementState> {
        self.status.subscribe()
    }

    /// Greet people when they are engaged
    pub fn with_greeter(mut self, greeter: Arc<Greeter>) -> Self {
        self.greeter = Some(greeter);
        self
    }

    pub fn tracker(&self) -> &EngagementTracker {
        &self.tracker
    }

    /// Consume frames until the source closes or shutdown is requested
    pub async fn run<S: DetectionSource>(mut self, mut source: S) {
        tracing::info!("Engagement loop started");

        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = source.next_frame() => next,
            };

            let frame = match next {
                None => {
                    tracing::info!("Detection source closed");
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Capture failed, skipping cycle");
                    None
                }
                Some(Ok(frame)) => Some(frame),
            };
            self.step(frame);
        }

        if let Some(active) = self.greeting.take() {
            active.cancel.cancel();
        }
        tracing::info!("Engagement loop stopped");
    }

    /// Process one cycle; `None` is a failed capture
    pub fn step(&mut self, frame: Option<TrackedFrame>) -> EngagementEvent {
        let event = self.tracker.observe(frame.as_ref());

        match &event {
            EngagementEvent::Engaged { detection, region } => {
                metrics::counter!("robot_chat_engagements_total").increment(1);
                if let (Some(greeter), Some(current)) = (&self.greeter, &frame) {
                    let cancel = self.shutdown.child_token();
                    greeter.spawn(current.frame.clone(), *region, cancel.clone());
                    self.greeting = Some(ActiveGreeting {
                        engaged_id: detection.id,
                        cancel,
                    });
                }
            }
            EngagementEvent::Disengaged { id } => {
                if let Some(active) = self.greeting.take() {
                    tracing::debug!(engaged_id = *id, greeting_for = active.engaged_id, "Cancelling greeting");
                    active.cancel.cancel();
                }
            }
            EngagementEvent::Unchanged => {}
        }
        if event != EngagementEvent::Unchanged {
            self.status.send_replace(self.tracker.state());
        }

        if let Some(frame) = frame {
            self.frames.update(frame);
        }
        event
    }
}
