//! Result of one invocation of the task's step function.

/// Describes the overall progress a step made, reported back to the step
/// loop once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StepOutcome {
    /// No step was started now and the job is not finished; more work will
    /// arrive through some external event, which must call
    /// [`StepDriver::drive`](crate::StepDriver::drive) again.
    StillWorking = 0,
    /// An asynchronous step was started; its completion will arrive through
    /// [`StepDriver::report_success`](crate::StepDriver::report_success) or
    /// [`StepDriver::report_failure`](crate::StepDriver::report_failure).
    StepStarted = 1,
    /// There is no more work; the overall job is complete.
    JobDone = 2,
}
