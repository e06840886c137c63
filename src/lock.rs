//! Five-state file locking protocol
//!
//! SQLite guards every database file with a cooperative lock ladder: any
//! number of readers at `Shared`, a single staged writer at `Reserved` while
//! readers keep reading the pre-transaction snapshot, `Pending` to stop new
//! readers from starving the writer, and `Exclusive` for the actual write.
//! Backends that are not real OS files cannot lean on advisory file locks,
//! so the protocol is reproduced here and shared by every handle on the same
//! file identity.

use self::LockState::{Exclusive, Pending, Reserved, Shared};

/// Lock held by one handle on a file identity.
///
/// The ordering is the upgrade ladder: `None < Shared < Reserved < Pending <
/// Exclusive`. A request at or below the current state is a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LockState {
    /// No lock held
    None,
    /// Read lock; any number of handles may hold it
    Shared,
    /// Staged write intent; at most one holder, readers continue
    Reserved,
    /// Writer waiting for readers to drain; blocks new `Shared` requests
    Pending,
    /// Full ownership; excludes every other lock
    Exclusive,
}

/// Aggregate lock accounting for one file identity.
///
/// Every handle on the identity contributes its current state. Upgrade
/// decisions are made against the *other* handles' contributions as one
/// indivisible step, under the mutex that owns this ledger.
#[derive(Debug, Default)]
pub struct LockLedger {
    /// Handles holding `Shared` or stronger
    shared: usize,
    reserved: bool,
    pending: bool,
    exclusive: bool,
}

impl LockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to move one handle from `from` to `to`.
    ///
    /// Weaker-or-equal targets are releases and always succeed. Stronger
    /// targets succeed only when the target state's invariant holds against
    /// the other handles; on contention the ledger is left unchanged and
    /// `false` is returned. Never blocks, never retries.
    pub fn try_transition(&mut self, from: LockState, to: LockState) -> bool {
        if to <= from {
            self.release(from, to);
            return true;
        }
        let allowed = match to {
            Shared => !self.others_pending_or_higher(from),
            Reserved => !(self.others_reserved(from) || self.others_pending_or_higher(from)),
            Pending => !self.others_pending_or_higher(from),
            Exclusive => self.others_shared(from) == 0,
            LockState::None => unreachable!("a target above `from` is never None"),
        };
        if allowed {
            self.retract(from);
            self.record(to);
        }
        allowed
    }

    /// Move one handle down from `from` to `to`.
    pub fn release(&mut self, from: LockState, to: LockState) {
        debug_assert!(to <= from);
        self.retract(from);
        self.record(to);
    }

    /// True iff some handle holds `Reserved` or stronger. Read-only.
    pub fn write_intent(&self) -> bool {
        self.reserved || self.pending || self.exclusive
    }

    fn record(&mut self, state: LockState) {
        if state >= Shared {
            self.shared += 1;
        }
        match state {
            Reserved => self.reserved = true,
            Pending => self.pending = true,
            Exclusive => self.exclusive = true,
            _ => {}
        }
    }

    fn retract(&mut self, state: LockState) {
        if state >= Shared {
            debug_assert!(self.shared > 0);
            self.shared -= 1;
        }
        match state {
            Reserved => self.reserved = false,
            Pending => self.pending = false,
            Exclusive => self.exclusive = false,
            _ => {}
        }
    }

    // Each of the holder flags has at most one owner, so subtracting the
    // caller's own contribution is a comparison, not a count.

    fn others_shared(&self, own: LockState) -> usize {
        self.shared - usize::from(own >= Shared)
    }

    fn others_reserved(&self, own: LockState) -> bool {
        self.reserved && own != Reserved
    }

    fn others_pending_or_higher(&self, own: LockState) -> bool {
        (self.pending && own != Pending) || (self.exclusive && own != Exclusive)
    }
}
