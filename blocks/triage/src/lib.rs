//! Report triage: compositions over the report and user atoms.
//! Submission guards, the role-gated status pipeline, the worker queue,
//! admin statistics and sample import live here, with their HTTP handlers.

pub mod access;
pub mod pipeline;
pub mod queue;
pub mod sample;
pub mod stats;
pub mod submission;

pub use submission::SubmissionPolicy;
