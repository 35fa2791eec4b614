use std::sync::{Mutex, PoisonError};
use tokio::task::JoinHandle;

/// Holds at most one background task handle. Arming always aborts the
/// previous handle before storing the replacement, so a double start cannot
/// leak a running timer.
#[derive(Debug, Default)]
pub struct TimerSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerSlot {
    pub fn arm(&self, handle: JoinHandle<()>) {
        let mut slot = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    pub fn disarm(&self) {
        let mut slot = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        let slot = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}
