//! # ow-pipeline
//!
//! The transcode orchestrator.
//!
//! - **[`Plan`]** -- the fixed two-step command sequence for each media kind.
//! - **[`TranscodeJob`]** -- the job state machine folded from
//!   [`JobUpdate`]s.
//! - **[`Transcoder`]** -- stages an upload in the engine, runs the plan,
//!   reports progress, and reads the result back.

pub mod job;
pub mod plan;
pub mod transcoder;

pub use job::{JobOutcome, JobPhase, JobSnapshot, JobUpdate, TranscodeJob};
pub use plan::{Plan, Step, GAIN_DB};
pub use transcoder::{Transcoder, UpdateSender};
