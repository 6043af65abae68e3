//! Job state machine.

use serde::{Deserialize, Serialize};

use ow_core::{JobId, MediaKind, TranscodeResult, UploadedFile};

/// Phase of a [`TranscodeJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Running,
    Succeeded,
    NoOutput,
    Failed,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// How a job ended.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Succeeded(TranscodeResult),
    /// The engine ran but wrote nothing to read back. Not an error.
    NoOutput,
    Failed(String),
}

impl JobOutcome {
    pub fn phase(&self) -> JobPhase {
        match self {
            Self::Succeeded(_) => JobPhase::Succeeded,
            Self::NoOutput => JobPhase::NoOutput,
            Self::Failed(_) => JobPhase::Failed,
        }
    }

    pub fn result(&self) -> Option<&TranscodeResult> {
        match self {
            Self::Succeeded(result) => Some(result),
            _ => None,
        }
    }
}

/// Message emitted by a running job.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    Started,
    /// Overall completion across all steps, plus the latest engine log line.
    Progress { ratio: f64, message: String },
    Finished(JobOutcome),
}

/// One upload's trip through the engine.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    id: JobId,
    kind: MediaKind,
    extension: String,
    source_name: String,
    ratio: f64,
    message: String,
    phase: JobPhase,
    error: Option<String>,
}

impl TranscodeJob {
    /// A job that has just been accepted for `upload`.
    pub fn start(id: JobId, upload: &UploadedFile, kind: MediaKind) -> Self {
        Self {
            id,
            kind,
            extension: upload.extension(kind),
            source_name: upload.name().to_string(),
            ratio: 0.0,
            message: String::new(),
            phase: JobPhase::Running,
            error: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.phase == JobPhase::Running
    }

    /// Fold an update into the job. Returns `false` if the job had already
    /// reached a terminal phase and the update was ignored.
    pub fn apply(&mut self, update: &JobUpdate) -> bool {
        if self.phase.is_terminal() {
            return false;
        }

        match update {
            JobUpdate::Started => {}
            JobUpdate::Progress { ratio, message } => {
                self.ratio = ratio.clamp(0.0, 1.0);
                self.message.clone_from(message);
            }
            JobUpdate::Finished(outcome) => {
                self.phase = outcome.phase();
                match outcome {
                    JobOutcome::Succeeded(_) => self.ratio = 1.0,
                    JobOutcome::Failed(msg) => self.error = Some(msg.clone()),
                    JobOutcome::NoOutput => {}
                }
            }
        }
        true
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            kind: self.kind,
            extension: self.extension.clone(),
            source_name: self.source_name.clone(),
            ratio: self.ratio,
            message: self.message.clone(),
            phase: self.phase,
            error: self.error.clone(),
        }
    }
}

/// Serializable view of a [`TranscodeJob`].
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct JobSnapshot {
    pub id: JobId,
    pub kind: MediaKind,
    pub extension: String,
    pub source_name: String,
    pub ratio: f64,
    pub message: String,
    pub phase: JobPhase,
    pub error: Option<String>,
}
