//! Single-slot label channel between the sequencer and the workload loop.
//!
//! Capacity is exactly one pending label. Publishing blocks until the
//! workload loop has taken the previous label, so no experiment boundary is
//! ever skipped. Dropping the [`LabelSender`] closes the channel, which is
//! the end-of-run signal for the workload loop.

use tokio::sync::mpsc;

/// Number of labels that may be pending at once.
const SLOT_CAPACITY: usize = 1;

/// Producer side, owned by the chaos sequencer.
#[derive(Debug)]
pub struct LabelSender {
    tx: mpsc::Sender<String>,
}

/// Consumer side, owned by the workload loop.
#[derive(Debug)]
pub struct LabelReceiver {
    rx: mpsc::Receiver<String>,
}

/// The receiver was dropped before the label could be delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("label channel closed")]
pub struct LabelChannelClosed;

/// Create a connected sender/receiver pair.
pub fn label_channel() -> (LabelSender, LabelReceiver) {
    let (tx, rx) = mpsc::channel(SLOT_CAPACITY);
    (LabelSender { tx }, LabelReceiver { rx })
}

impl LabelSender {
    /// Publish `label`, waiting while the previous one is still pending.
    pub async fn publish(&self, label: &str) -> Result<(), LabelChannelClosed> {
        self.tx
            .send(label.to_string())
            .await
            .map_err(|_| LabelChannelClosed)
    }

    /// Close the channel.
    pub fn close(self) {
        drop(self);
    }
}

impl LabelReceiver {
    /// Next label, or `None` once the sender is gone and the slot is empty.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}
