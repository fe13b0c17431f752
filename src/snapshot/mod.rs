use crate::dsmr::Frame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub decoded: u64,
    pub rejected: u64,
}

/// Single slot holding the most recent decoded telegram.
///
/// Written by the blocking serial reader, read by the publisher. Each stored
/// frame gets the next sequence number so readers can tell whether anything
/// changed since they last looked.
pub struct LatestFrame {
    slot: RwLock<Option<(u64, Arc<Frame>)>>,
    decoded: AtomicU64,
    rejected: AtomicU64,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
            decoded: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn store(&self, frame: Frame) -> u64 {
        let frame = Arc::new(frame);
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        let seq = self.decoded.fetch_add(1, Ordering::Relaxed) + 1;
        *slot = Some((seq, frame));
        seq
    }

    pub fn snapshot(&self) -> Option<(u64, Arc<Frame>)> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).is_none()
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            decoded: self.decoded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for LatestFrame {
    fn default() -> Self {
        Self::new()
    }
}
