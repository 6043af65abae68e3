//! Upload surface: the single-job gate, the drop-zone state machine, and
//! multipart extraction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::Multipart;
use serde::Serialize;

use ow_core::{MediaKind, UploadedFile};

/// Name of the multipart field carrying the file.
pub const FILE_FIELD: &str = "file";

/// Shown while a rejected type hovers over the drop zone.
pub const UNSUPPORTED_TYPE_COPY: &str = "音声ファイルか動画ファイルを指定してください";

// ---------------------------------------------------------------------------
// UploadGate
// ---------------------------------------------------------------------------

/// Admits at most one running job.
#[derive(Debug, Default)]
pub struct UploadGate {
    busy: Arc<AtomicBool>,
}

/// Held for the lifetime of a job; dropping it reopens the gate.
#[derive(Debug)]
pub struct JobPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl UploadGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Claim the gate.
    ///
    /// # Errors
    ///
    /// Returns [`ow_core::Error::Conflict`] while another permit is alive.
    pub fn try_acquire(&self) -> ow_core::Result<JobPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ow_core::Error::Conflict("a job is already running".into()))?;
        Ok(JobPermit {
            busy: self.busy.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// DropZone
// ---------------------------------------------------------------------------

/// Visual state of the drop zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Affordance {
    Idle,
    Accept,
    Reject,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Dragging(Option<MediaKind>),
}

/// What happened to a dropped file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Accepted(MediaKind),
    Rejected,
}

/// Drag-and-drop state: `idle -> dragging -> (accept | reject)`.
#[derive(Debug, Clone)]
pub struct DropZone {
    phase: Phase,
    busy: bool,
}

impl DropZone {
    pub fn new(busy: bool) -> Self {
        Self {
            phase: Phase::Idle,
            busy,
        }
    }

    /// A drag carrying `mime` entered the zone.
    pub fn enter(&mut self, mime: &str) -> Affordance {
        self.phase = Phase::Dragging(MediaKind::from_mime(mime).ok());
        self.affordance()
    }

    /// The drag left without dropping.
    pub fn leave(&mut self) {
        self.phase = Phase::Idle;
    }

    /// The file was released over the zone. The zone returns to idle.
    pub fn drop_file(&mut self) -> DropOutcome {
        let outcome = match self.phase {
            Phase::Dragging(Some(kind)) if !self.busy => DropOutcome::Accepted(kind),
            _ => DropOutcome::Rejected,
        };
        self.phase = Phase::Idle;
        outcome
    }

    pub fn affordance(&self) -> Affordance {
        match self.phase {
            _ if self.busy => Affordance::Busy,
            Phase::Idle => Affordance::Idle,
            Phase::Dragging(Some(_)) => Affordance::Accept,
            Phase::Dragging(None) => Affordance::Reject,
        }
    }
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

/// Pull the first `file` field out of a multipart body. Further files are
/// ignored.
///
/// The MIME type comes from the part's `Content-Type`, or is guessed from the
/// file name when the client sent none.
pub async fn read_upload(mut multipart: Multipart) -> ow_core::Result<UploadedFile> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ow_core::Error::Validation(format!("malformed upload: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ow_core::Error::Validation("uploaded file has no name".into()))?;

        let mime = match field.content_type() {
            Some(ct) if !ct.is_empty() => ct.to_string(),
            _ => mime_guess::from_path(&name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| ow_core::Error::Validation(format!("failed to read upload: {e}")))?;

        return Ok(UploadedFile::new(name, mime, data));
    }

    Err(ow_core::Error::Validation(format!(
        "no `{FILE_FIELD}` field in upload"
    )))
}
