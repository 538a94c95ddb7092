//! Collective operations across cooperating ranks.
//!
//! A probe collection talks to other ranks exactly once, at construction,
//! to sum the number of owned probes. Every rank in the group must make that
//! call or the group deadlocks.
//!
//! # Implementations
//!
//! - [`SelfComm`] - A single rank, collectives are identities
//! - [`ThreadComm`] - `n` ranks living on threads of one process
//!
//! Sums are computed from rank-ordered contributions with a fixed binary
//! tree so every rank sees the identical result:
//!
//! ```text
//! Ranks: [r0, r1, r2, r3, r4]
//!
//! Level 0: r0+r1  r2+r3  r4
//! Level 1: (r0+r1)+(r2+r3)  r4
//! Level 2: ((r0+r1)+(r2+r3))+r4
//! ```

use std::sync::{Arc, Barrier, Mutex};

use thiserror::Error;

/// Errors raised by collective operations.
#[derive(Debug, Error)]
pub enum CommError {
    /// Another rank panicked while holding the shared buffer.
    #[error("communicator poisoned: a rank panicked during a collective")]
    Poisoned,

    #[error("rank {rank} out of range for group of size {size}")]
    RankOutOfRange { rank: usize, size: usize },

    /// A rank did not contribute to a collective.
    #[error("rank {0} did not contribute to the collective")]
    MissingContribution(usize),
}

/// Collective reduction primitive shared by all ranks of a group.
pub trait Communicator: Send + Sync {
    /// This rank's index in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Rank-ordered contributions of every rank. Blocking.
    fn gather(&self, local: usize) -> Result<Vec<usize>, CommError>;

    /// Sum of `local` over all ranks. Blocking.
    fn sum(&self, local: usize) -> Result<usize, CommError> {
        let contributions = self.gather(local)?;
        Ok(tree_reduce(&contributions, |a, b| a + b).unwrap_or(0))
    }
}

/// Deterministic tree reduction with a binary operation.
///
/// Pairs are determined by index, never by arrival order. Returns `None` for
/// an empty slice.
pub fn tree_reduce<T, F>(values: &[T], op: F) -> Option<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    if values.is_empty() {
        return None;
    }

    let mut current: Vec<T> = values.to_vec();
    let mut next: Vec<T> = Vec::with_capacity(values.len().div_ceil(2));

    while current.len() > 1 {
        next.clear();

        let mut i = 0;
        while i + 1 < current.len() {
            next.push(op(current[i], current[i + 1]));
            i += 2;
        }

        // Carry forward odd element
        if i < current.len() {
            next.push(current[i]);
        }

        std::mem::swap(&mut current, &mut next);
    }

    Some(current[0])
}

/// Single-rank communicator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn gather(&self, local: usize) -> Result<Vec<usize>, CommError> {
        Ok(vec![local])
    }
}

struct Shared {
    slots: Mutex<Vec<Option<usize>>>,
    barrier: Barrier,
}

/// One rank of an in-process group, meant to be moved onto its own thread.
///
/// Collectives block until every rank of the group has called them, so each
/// rank must issue the same collectives in the same order.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    /// Create the `size` ranks of a new group.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let shared = Arc::new(Shared {
            slots: Mutex::new(vec![None; size]),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn gather(&self, local: usize) -> Result<Vec<usize>, CommError> {
        if self.rank >= self.size {
            return Err(CommError::RankOutOfRange {
                rank: self.rank,
                size: self.size,
            });
        }

        let written = self
            .shared
            .slots
            .lock()
            .map(|mut slots| slots[self.rank] = Some(local))
            .map_err(|_| CommError::Poisoned);
        self.shared.barrier.wait();

        let read = written.and_then(|()| {
            let slots = self.shared.slots.lock().map_err(|_| CommError::Poisoned)?;
            slots
                .iter()
                .enumerate()
                .map(|(rank, slot)| slot.ok_or(CommError::MissingContribution(rank)))
                .collect::<Result<Vec<_>, _>>()
        });

        // Nobody may overwrite a slot until every rank has read.
        self.shared.barrier.wait();
        read
    }
}
