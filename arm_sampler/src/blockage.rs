//! Sliding-window detection of a stuck end effector.

use std::collections::VecDeque;

use nalgebra::Point3;

/// Fixed-capacity FIFO of recent settled end-effector positions.
#[derive(Debug, Clone)]
pub struct BlockageDetector {
    window: VecDeque<Point3<f64>>,
    capacity: usize,
}

impl BlockageDetector {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a position, evicting the oldest entry when at capacity.
    pub fn push(&mut self, position: Point3<f64>) {
        if self.capacity == 0 {
            return;
        }
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(position);
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.window.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn positions(&self) -> impl Iterator<Item = &Point3<f64>> {
        self.window.iter()
    }

    /// Largest pairwise distance between positions in the window.
    pub fn max_span(&self) -> f64 {
        let mut max = 0.0_f64;
        for (i, a) in self.window.iter().enumerate() {
            for b in self.window.iter().skip(i + 1) {
                max = max.max(nalgebra::distance(a, b));
            }
        }
        max
    }

    /// `true` only once the window is full and its span is below `min_span_m`.
    pub fn is_blocked(&self, min_span_m: f64) -> bool {
        self.is_full() && self.max_span() < min_span_m
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}
