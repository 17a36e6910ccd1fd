//! Per-attempt timeout signal.

use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const ARMED: u8 = 0;
const DISARMED: u8 = 1;
const FIRED: u8 = 2;

/// Cancellation signal that fires on its own after a timeout unless disarmed.
///
/// One context covers exactly one attempt. Dropping it stops the timer, so a
/// context never outlives the attempt that created it. Must be created inside
/// a tokio runtime.
#[derive(Debug)]
pub struct TimeoutContext {
    signal: CancellationToken,
    state: Arc<AtomicU8>,
    timer: JoinHandle<()>,
}

impl TimeoutContext {
    /// Arms a new signal that cancels after `timeout`.
    pub fn create(timeout: Duration) -> Self {
        let signal = CancellationToken::new();
        let state = Arc::new(AtomicU8::new(ARMED));

        let timer = tokio::spawn({
            let signal = signal.clone();
            let state = Arc::clone(&state);
            async move {
                tokio::time::sleep(timeout).await;
                if state
                    .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    signal.cancel();
                }
            }
        });

        Self {
            signal,
            state,
            timer,
        }
    }

    /// Token to hand to the transport for this attempt.
    pub fn signal(&self) -> &CancellationToken {
        &self.signal
    }

    /// Suppresses a pending cancellation.
    ///
    /// Returns `false` when the timer already fired; the abort stands.
    pub fn disarm(&self) -> bool {
        match self
            .state
            .compare_exchange(ARMED, DISARMED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.timer.abort();
                true
            }
            Err(current) => current == DISARMED,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state.load(Ordering::Acquire) == ARMED
    }

    /// Whether the timeout fired and cancelled the signal.
    pub fn is_aborted(&self) -> bool {
        self.signal.is_cancelled()
    }
}

impl Drop for TimeoutContext {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
