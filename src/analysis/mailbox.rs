//! Latest-frame-wins hand-off to a consumer on another thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};

use super::features::FeatureSnapshot;
use super::publisher::Subscriber;

/// Subscriber half. Register it with `FeaturePublisher::subscribe`.
/// Dropping it (or destroying the publisher) closes the mailbox.
pub struct MailboxSender {
    tx: Sender<Arc<FeatureSnapshot>>,
    // Used to evict an unread frame when a newer one arrives.
    evict: Receiver<Arc<FeatureSnapshot>>,
    overwritten: Arc<AtomicU64>,
}

/// Consumer half; may live on any thread.
pub struct MailboxReceiver {
    rx: Receiver<Arc<FeatureSnapshot>>,
    overwritten: Arc<AtomicU64>,
}

pub fn frame_mailbox() -> (MailboxSender, MailboxReceiver) {
    let (tx, rx) = bounded(1);
    let overwritten = Arc::new(AtomicU64::new(0));
    (
        MailboxSender {
            tx,
            evict: rx.clone(),
            overwritten: overwritten.clone(),
        },
        MailboxReceiver { rx, overwritten },
    )
}

impl Subscriber for MailboxSender {
    fn on_feature_frame(&mut self, snapshot: &Arc<FeatureSnapshot>) -> Result<()> {
        let mut frame = snapshot.clone();
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(back)) => {
                    if self.evict.try_recv().is_ok() {
                        self.overwritten.fetch_add(1, Ordering::Relaxed);
                    }
                    frame = back;
                }
                // Both receivers live as long as this sender does.
                Err(TrySendError::Disconnected(_)) => return Ok(()),
            }
        }
    }
}

impl MailboxReceiver {
    pub fn try_recv(&self) -> Option<Arc<FeatureSnapshot>> {
        match self.rx.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block until a frame is available. `None` once the sender is gone and
    /// nothing is pending.
    pub fn recv(&self) -> Option<Arc<FeatureSnapshot>> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Arc<FeatureSnapshot>> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Frames replaced before the consumer picked them up.
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}
