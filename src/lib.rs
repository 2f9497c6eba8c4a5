//! Iterative driving of callback-completed jobs.
//!
//! A large job, such as writing a big payload to a socket in chunks, is
//! often broken into asynchronous sub-steps where each step's completion is
//! reported through a callback. If the callback fires on the same thread
//! that started the step and immediately starts the next one, the whole job
//! becomes a recursive call chain and deep synchronous completion chains
//! overflow the stack. Dispatching every step to another thread avoids the
//! recursion but pays a context switch per step.
//!
//! [`StepDriver`] avoids both: it records in an atomic state cell whether a
//! step's completion arrived while that step was still being resolved, and
//! if so it iterates instead of recursing. Completions that arrive later,
//! from any thread, claim ownership of the loop and resume it right there.
//! No locks, no condition variables; every interleaving of driving,
//! completing, cancelling and resetting is resolved by compare-exchange on
//! the single state cell.
//!
//! The job supplies its work through the [`IteratingTask`] trait: a step
//! function invoked once per iteration, never concurrently with itself, and
//! two completion hooks that each fire at most once per job.
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use stepdrive::{IteratingTask, JobError, StepDriver, StepOutcome};
//!
//! /// Writes a payload in chunks; every "write" completes synchronously.
//! struct ChunkedWrite {
//!     chunks_left: AtomicUsize,
//! }
//!
//! impl IteratingTask for ChunkedWrite {
//!     fn step(&self, driver: &StepDriver<Self>) -> Result<StepOutcome, JobError> {
//!         let left = self.chunks_left.load(Ordering::Relaxed);
//!         if left == 0 {
//!             return Ok(StepOutcome::JobDone);
//!         }
//!         self.chunks_left.store(left - 1, Ordering::Relaxed);
//!         // The chunk is "written" before the step even returns. A real
//!         // task would hand the driver handle to its I/O layer instead.
//!         driver.report_success();
//!         Ok(StepOutcome::StepStarted)
//!     }
//! }
//!
//! let driver = StepDriver::new(ChunkedWrite {
//!     chunks_left: AtomicUsize::new(10_000),
//! });
//! // 10 000 back-to-back synchronous completions, constant stack depth.
//! driver.drive();
//! assert!(driver.is_succeeded());
//! ```

mod driver;
mod error;
mod outcome;
mod state;
mod task;

pub use driver::StepDriver;
pub use error::JobError;
pub use outcome::StepOutcome;
pub use task::IteratingTask;
