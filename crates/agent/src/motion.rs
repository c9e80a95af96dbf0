//! Reserved motion slot
//!
//! One code path reserves a motion (the model's pick in chat-with-motion
//! mode), another flushes it later (the SendMotion RPC). Direct sends go
//! through the same place so dispatch failures are handled alike.

use std::sync::Arc;

use parking_lot::Mutex;
use robot_chat_core::{MotionCommand, MotionDispatcher};

pub struct MotionReservation {
    dispatcher: Arc<dyn MotionDispatcher>,
    reserved: Mutex<Option<MotionCommand>>,
}

impl MotionReservation {
    pub fn new(dispatcher: Arc<dyn MotionDispatcher>) -> Self {
        Self {
            dispatcher,
            reserved: Mutex::new(None),
        }
    }

    /// Queue `command`, replacing any earlier reservation
    pub fn reserve(&self, command: MotionCommand) {
        tracing::debug!(motion = %command.name, "Motion reserved");
        if let Some(previous) = self.reserved.lock().replace(command) {
            tracing::debug!(motion = %previous.name, "Dropping unsent reservation");
        }
    }

    pub fn take(&self) -> Option<MotionCommand> {
        self.reserved.lock().take()
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved.lock().is_some()
    }

    /// Send the reserved motion, if any. Returns whether one was delivered.
    pub async fn send_reserved(&self) -> bool {
        match self.take() {
            Some(command) => self.send(&command).await,
            None => {
                tracing::debug!("No reserved motion to send");
                false
            }
        }
    }

    /// Send `command` now; failures are logged, never propagated
    pub async fn send(&self, command: &MotionCommand) -> bool {
        match self.dispatcher.set_motion(command).await {
            Ok(()) => {
                tracing::debug!(motion = %command.name, "Motion sent");
                true
            }
            Err(e) => {
                tracing::warn!(motion = %command.name, error = %e, "Motion dispatch failed");
                metrics::counter!("robot_chat_dispatch_errors_total", "target" => "motion")
                    .increment(1);
                false
            }
        }
    }
}

/// Motion held back until the first sentence of a turn is spoken.
///
/// Fires at most once per turn.
#[derive(Debug, Default)]
pub struct DeferredMotion {
    pending: Option<MotionCommand>,
    fired: bool,
}

impl DeferredMotion {
    /// Set the pending motion unless one was already set or sent this turn
    pub fn set(&mut self, command: MotionCommand) {
        if !self.fired && self.pending.is_none() {
            self.pending = Some(command);
        }
    }

    /// Send the pending motion on first call; later calls do nothing
    pub async fn fire(&mut self, motion: &MotionReservation) {
        if self.fired {
            return;
        }
        if let Some(command) = self.pending.take() {
            self.fired = true;
            motion.send(&command).await;
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use robot_chat_core::{Error, Result};

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl MotionDispatcher for Recorder {
        async fn set_motion(&self, command: &MotionCommand) -> Result<()> {
            if self.fail {
                return Err(Error::Motion("offline".to_string()));
            }
            self.sent.lock().push(command.name.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_reserved_once() {
        let recorder = Arc::new(Recorder::default());
        let motion = MotionReservation::new(recorder.clone());

        motion.reserve(MotionCommand::new("nod"));
        motion.reserve(MotionCommand::new("bow"));
        assert!(motion.send_reserved().await);
        assert!(!motion.send_reserved().await);
        assert_eq!(*recorder.sent.lock(), vec!["bow".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let motion = MotionReservation::new(recorder);
        assert!(!motion.send(&MotionCommand::new("nod")).await);
    }

    #[tokio::test]
    async fn test_deferred_motion_fires_once() {
        let recorder = Arc::new(Recorder::default());
        let motion = MotionReservation::new(recorder.clone());
        let mut deferred = DeferredMotion::default();

        deferred.fire(&motion).await;
        deferred.set(MotionCommand::new("nod"));
        deferred.set(MotionCommand::new("bow"));
        deferred.fire(&motion).await;
        deferred.set(MotionCommand::new("wave"));
        deferred.fire(&motion).await;

        assert!(deferred.has_fired());
        assert_eq!(*recorder.sent.lock(), vec!["nod".to_string()]);
    }
}
