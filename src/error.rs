//! Failure value delivered to the task's failure hook.

use thiserror::Error;

/// The single failure a job can end with, passed to
/// [`IteratingTask::on_job_failed`](crate::IteratingTask::on_job_failed)
/// at most once per job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The driver was cancelled while a step was still in flight. The
    /// outstanding step's completion will never be awaited.
    #[error("driver closed while a step was in flight")]
    Closed,

    /// The task's step raised or reported a failure of its own.
    #[error("step failed: {0}")]
    Step(Box<dyn std::error::Error + Send + Sync>),
}

impl JobError {
    /// Wraps an arbitrary error as a step failure.
    pub fn step(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        JobError::Step(error.into())
    }

    /// Whether this is the synthetic cancellation failure.
    #[inline(always)]
    pub fn is_closed(&self) -> bool {
        matches!(self, JobError::Closed)
    }
}
