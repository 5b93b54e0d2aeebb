//! Sticky per-joint collision flags.
//!
//! The physics side holds a [`CollisionSink`] and raises flags whenever a
//! collision begins; the campaign holds the [`CollisionMonitor`] and drains
//! them once per trial. Flags are atomics shared through an `Arc`, so a raise
//! can never be lost between the read and the clear of a drain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Write-only handle given to the physics backend.
#[derive(Debug, Clone)]
pub struct CollisionSink {
    flags: Arc<Vec<AtomicBool>>,
}

impl CollisionSink {
    /// Idempotent. Unknown joints are ignored.
    pub fn on_collision(&self, joint: usize) {
        if let Some(flag) = self.flags.get(joint) {
            flag.store(true, Ordering::Release);
        }
    }
}

#[derive(Debug)]
pub struct CollisionMonitor {
    flags: Arc<Vec<AtomicBool>>,
}

impl CollisionMonitor {
    /// One flag per joint, root included; the root never counts as a collision.
    pub fn new(joint_count: usize) -> Self {
        let flags = (0..joint_count).map(|_| AtomicBool::new(false)).collect();
        Self {
            flags: Arc::new(flags),
        }
    }

    pub fn sink(&self) -> CollisionSink {
        CollisionSink {
            flags: Arc::clone(&self.flags),
        }
    }

    pub fn on_collision(&self, joint: usize) {
        if let Some(flag) = self.flags.get(joint) {
            flag.store(true, Ordering::Release);
        }
    }

    pub fn is_set(&self, joint: usize) -> bool {
        self.flags
            .get(joint)
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub fn any_collision(&self) -> bool {
        self.flags
            .iter()
            .skip(1)
            .any(|flag| flag.load(Ordering::Acquire))
    }

    pub fn reset_all(&self) {
        for flag in self.flags.iter() {
            flag.store(false, Ordering::Release);
        }
    }

    /// Read and clear every flag in one pass, returning the actuated joints
    /// that had collided. Each flag is swapped atomically, so a raise that
    /// lands after its swap stays set for the next drain.
    pub fn drain(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(joint, flag)| {
                let was_set = flag.swap(false, Ordering::AcqRel);
                (was_set && joint > 0).then_some(joint)
            })
            .collect()
    }

    pub fn joint_count(&self) -> usize {
        self.flags.len()
    }
}
