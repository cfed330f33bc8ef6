//! Out-of-Band (OOB) confirmation infrastructure
//!
//! The verification filter calls back to the scanner when it executes on the
//! target. The callback listener turns that request into a notification on a
//! per-run [`CallbackSignal`], which the active probe polls without blocking.

pub mod http_server;

pub use http_server::CallbackListener;

use crate::error::{Result, ZuulError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Generates a unique scan ID (12 char hex)
pub fn generate_id() -> String {
    let id = uuid::Uuid::new_v4();
    let hex = format!("{:032x}", id.as_u128());
    hex[..12].to_string()
}

/// Creates a confirmation channel buffering up to `capacity` callbacks.
pub fn callback_channel(capacity: usize) -> Result<(CallbackNotifier, CallbackSignal)> {
    if capacity == 0 {
        return Err(ZuulError::InvalidInput(
            "callback channel must be buffered (capacity >= 1)".to_string(),
        ));
    }
    let (tx, rx) = mpsc::channel(capacity);
    Ok((CallbackNotifier { tx }, CallbackSignal { rx }))
}

/// Sending half of a confirmation channel, held by the callback receiver
#[derive(Debug, Clone)]
pub struct CallbackNotifier {
    tx: mpsc::Sender<()>,
}

impl CallbackNotifier {
    /// Records a received callback. Never blocks; duplicates past the
    /// channel capacity are dropped.
    pub fn notify(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => {
                tracing::debug!("Callback received after the scan finished");
            }
        }
    }
}

/// Receiving half of a confirmation channel, read by the active probe
#[derive(Debug)]
pub struct CallbackSignal {
    rx: mpsc::Receiver<()>,
}

impl CallbackSignal {
    /// Returns true if a callback has arrived, without waiting
    pub fn try_receive(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        let err = callback_channel(0).expect_err("zero capacity");
        assert!(matches!(err, ZuulError::InvalidInput(_)));
    }

    #[test]
    fn test_signal_empty_until_notified() {
        let (notifier, mut signal) = callback_channel(1).expect("channel");
        assert!(!signal.try_receive());

        notifier.notify();
        notifier.notify();
        assert!(signal.try_receive());
        assert!(!signal.try_receive());
    }

    #[test]
    fn test_notify_after_signal_dropped() {
        let (notifier, signal) = callback_channel(1).expect("channel");
        drop(signal);
        notifier.notify();
    }

    #[test]
    fn test_generate_id() {
        let id = generate_id();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_id());
    }
}
