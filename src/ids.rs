//! Type-scoped identifier allocation.
//!
//! Every entity in a backup carries a numeric id. Moodle's own exporter keeps
//! the different id kinds in separate numeric ranges, and restore relies on
//! them never overlapping, so each [`IdKind`] owns a fixed half-open range and
//! hands out ids from it in ascending order.
//!
//! An [`IdAllocator`] is plain instance state: create one per build (it is
//! owned by the [`Course`](crate::Course)) and two builds can never leak ids
//! into each other.

use crate::error::{Error, Result};

/// The kinds of identifiers allocated during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    File,
    Context,
    Activity,
    Module,
    Section,
    LessonPage,
    LessonAnswer,
}

impl IdKind {
    /// All kinds, in range order.
    pub const ALL: [IdKind; 7] = [
        IdKind::File,
        IdKind::Context,
        IdKind::Activity,
        IdKind::Module,
        IdKind::Section,
        IdKind::LessonPage,
        IdKind::LessonAnswer,
    ];

    /// The half-open range `[start, end)` reserved for this kind.
    pub const fn range(self) -> (u64, u64) {
        match self {
            IdKind::File => (10_000, 15_000),
            IdKind::Context => (15_000, 20_000),
            IdKind::Activity => (20_000, 25_000),
            IdKind::Module => (25_000, 30_000),
            IdKind::Section => (30_000, 36_000),
            IdKind::LessonPage => (36_000, 69_000),
            IdKind::LessonAnswer => (69_000, 200_000),
        }
    }

    const fn index(self) -> usize {
        match self {
            IdKind::File => 0,
            IdKind::Context => 1,
            IdKind::Activity => 2,
            IdKind::Module => 3,
            IdKind::Section => 4,
            IdKind::LessonPage => 5,
            IdKind::LessonAnswer => 6,
        }
    }
}

/// Deterministic per-build id counters, one per [`IdKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next: [u64; 7],
}

impl IdAllocator {
    pub fn new() -> Self {
        let mut next = [0; 7];
        for kind in IdKind::ALL {
            next[kind.index()] = kind.range().0;
        }
        Self { next }
    }

    /// Allocate the next id of `kind`.
    pub fn next(&mut self, kind: IdKind) -> Result<u64> {
        self.next_block(kind, 1)
    }

    /// Allocate `count` consecutive ids of `kind` and return the first.
    ///
    /// Lesson pages are numbered with a stride of 10 and reserve their whole
    /// block up front through this method.
    pub fn next_block(&mut self, kind: IdKind, count: u64) -> Result<u64> {
        let slot = &mut self.next[kind.index()];
        let id = *slot;
        let end = id
            .checked_add(count)
            .ok_or(Error::IdRangeExhausted(kind))?;
        if end > kind.range().1 {
            return Err(Error::IdRangeExhausted(kind));
        }
        *slot = end;
        Ok(id)
    }

    /// The id the next call to [`next`](Self::next) would return.
    pub fn peek(&self, kind: IdKind) -> u64 {
        self.next[kind.index()]
    }

    /// Rewind every counter to the start of its range.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
