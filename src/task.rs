//! The per-job work supplier driven by the step loop.

use crate::driver::StepDriver;
use crate::error::JobError;
use crate::outcome::StepOutcome;

/// A job broken into steps, supplied to a [`StepDriver`].
///
/// The driver invokes [`step`](IteratingTask::step) once per iteration, on
/// whichever thread currently owns the step loop, and guarantees it is never
/// invoked concurrently with itself. The completion hooks each fire at most
/// once per job, from the thread that installed the terminal state.
pub trait IteratingTask: Sized {
    /// Starts the next unit of work, if any, and reports how the job
    /// progressed:
    ///
    /// - [`StepOutcome::StillWorking`] when nothing can be started right now
    ///   but the job is not done; some external event must
    ///   [`drive`](StepDriver::drive) the machine again.
    /// - [`StepOutcome::StepStarted`] when an asynchronous step was started;
    ///   its completion must be reported exactly once through
    ///   [`StepDriver::report_success`] or [`StepDriver::report_failure`].
    /// - [`StepOutcome::JobDone`] when the overall job is complete.
    ///
    /// The `driver` handle is the route back into the machine: a step that
    /// completes synchronously calls `driver.report_success()` before
    /// returning `StepStarted`, and a genuinely asynchronous step clones the
    /// handle and reports from the completing thread later.
    ///
    /// Returning an error fails the whole job.
    fn step(&self, driver: &StepDriver<Self>) -> Result<StepOutcome, JobError>;

    /// Invoked when the overall job has completed successfully.
    fn on_job_succeeded(&self) {}

    /// Invoked when the overall job has failed, with the failure that ended
    /// it.
    fn on_job_failed(&self, error: JobError) {
        let _ = error;
    }
}
