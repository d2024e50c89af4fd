//! General utility types.
use std::collections::vec_deque::Iter;
use std::collections::VecDeque;

/// Fixed capacity log where the most recent entry comes first.
#[derive(Clone, Debug)]
pub struct RingBuffer<T, const N: usize> {
    entries: VecDeque<T>,
}

impl<T, const N: usize> RingBuffer<T, N> {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn push(&mut self, entry: T) {
        if self.entries.len() == N {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates from the most recent to the oldest entry.
    pub fn iter(&self) -> Iter<'_, T> {
        self.entries.iter()
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self {
            entries: VecDeque::with_capacity(N),
        }
    }
}

/// Detects rising edges of a signal, e.g. PPU address line A12 for the MMC3 scanline counter.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct EdgeDetector {
    value: bool,
}

impl EdgeDetector {
    pub fn new(value: bool) -> Self {
        Self { value }
    }

    /// Updates the signal and returns true if it went from low to high.
    pub fn rising(&mut self, value: bool) -> bool {
        let rose = value && !self.value;
        self.value = value;
        rose
    }

    pub fn value(&self) -> bool {
        self.value
    }
}
