//! Even/odd sequence protocol for single-writer segments
//!
//! The writer bumps the sequence to an odd value before touching the
//! payload and to the next even value after. A reader accepts a copy only
//! if it saw the same even value before and after copying.

use std::sync::atomic::{AtomicU64, Ordering, fence};

/// Borrowed view of a segment's sequence word
#[derive(Debug, Clone, Copy)]
pub struct Sequence<'a> {
    word: &'a AtomicU64,
}

impl<'a> Sequence<'a> {
    /// Wrap the sequence word living in a segment header
    pub fn new(word: &'a AtomicU64) -> Self {
        Self { word }
    }

    /// Current value with acquire ordering
    #[inline]
    pub fn load(&self) -> u64 {
        self.word.load(Ordering::Acquire)
    }

    /// Enter the write section; returns the odd in-progress value
    #[inline]
    pub fn begin_write(&self) -> u64 {
        let next = self.word.load(Ordering::Relaxed).wrapping_add(1);
        self.word.store(next, Ordering::Relaxed);
        fence(Ordering::Release);
        next
    }

    /// Leave the write section; returns the even committed value
    #[inline]
    pub fn end_write(&self) -> u64 {
        let next = self.word.load(Ordering::Relaxed).wrapping_add(1);
        self.word.store(next, Ordering::Release);
        next
    }

    /// Check if version is stable (even)
    #[inline]
    pub fn is_stable(version: u64) -> bool {
        version % 2 == 0
    }

    /// Check if version indicates write in progress (odd)
    #[inline]
    pub fn is_writing(version: u64) -> bool {
        version % 2 == 1
    }
}
