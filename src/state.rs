//! Internal state cell of the step driver.
//!
//! The entire driver is one atomically-updated `State` value plus a single
//! iterate-requested flag. Every transition goes through compare-exchange on
//! the cell; there is no outer lock.

use std::sync::atomic::{AtomicU8, Ordering};

/// The internal states of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum State {
    /// Parked, ready to iterate on the next drive.
    Idle = 0,
    /// A thread owns the step loop and is iterating calls to the task's step.
    Processing = 1,
    /// An asynchronous step was started and the loop has handed ownership to
    /// the eventual completion call.
    Pending = 2,
    /// A completion arrived while the loop still owned the state; the loop
    /// will claim it and keep iterating.
    Called = 3,
    /// The overall job completed successfully. Terminal until reset.
    Succeeded = 4,
    /// The overall job failed. Terminal until reset.
    Failed = 5,
    /// Cancelled for good. Absorbing; no transition leaves this state.
    Closed = 6,
    /// Transient critical section guarding the iterate-requested flag.
    /// Entered only from `Processing`, exited only by the thread that won
    /// the entry CAS. Never a resting state.
    Locked = 7,
}

impl State {
    fn from_u8(raw: u8) -> State {
        match raw {
            0 => State::Idle,
            1 => State::Processing,
            2 => State::Pending,
            3 => State::Called,
            4 => State::Succeeded,
            5 => State::Failed,
            6 => State::Closed,
            7 => State::Locked,
            _ => unreachable!("corrupt state cell: {raw}"),
        }
    }
}

/// `State` stored in an `AtomicU8`.
///
/// Loads are Acquire and stores Release so that anything written before a
/// transition (the iterate flag, the task's own fields) is visible to the
/// thread that observes the transition.
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    #[inline(always)]
    pub(crate) fn new(state: State) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline(always)]
    pub(crate) fn load(&self) -> State {
        State::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Plain release store. Only legal for the thread that holds `Locked`,
    /// which is the one state nobody else may transition away from.
    #[inline(always)]
    pub(crate) fn store(&self, state: State) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Single attempt; the caller decides whether to re-read and retry.
    #[inline(always)]
    pub(crate) fn compare_exchange(&self, current: State, new: State) -> Result<State, State> {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(State::from_u8)
            .map_err(State::from_u8)
    }
}

impl std::fmt::Debug for AtomicState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.load())
    }
}
