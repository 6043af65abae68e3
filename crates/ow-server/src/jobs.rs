//! Job submission and the board holding the current job and latest result.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use ow_core::events::EventPayload;
use ow_core::{JobId, TranscodeResult, UploadedFile};
use ow_engine::CodecEngine;
use ow_pipeline::{JobOutcome, JobSnapshot, JobUpdate, TranscodeJob, Transcoder};

use crate::context::AppContext;
use crate::upload::JobPermit;

/// Smallest ratio change worth broadcasting.
const PROGRESS_STEP: f64 = 0.01;

#[derive(Debug, Default)]
struct BoardState {
    current: Option<TranscodeJob>,
    result: Option<TranscodeResult>,
}

/// The current job (running or last finished) and the latest result.
///
/// A result stays available until a later job succeeds. Both live under one
/// lock so a reader never sees a finished job next to the previous result.
#[derive(Debug, Default)]
pub struct JobBoard {
    state: RwLock<BoardState>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current job with a freshly started one.
    pub fn begin(&self, job: TranscodeJob) {
        self.state.write().current = Some(job);
    }

    /// Fold an update into the current job; a success also publishes the
    /// result.
    pub fn apply(&self, update: &JobUpdate) {
        let mut state = self.state.write();
        if let Some(job) = state.current.as_mut() {
            job.apply(update);
        }
        if let JobUpdate::Finished(JobOutcome::Succeeded(result)) = update {
            state.result = Some(result.clone());
        }
    }

    pub fn current(&self) -> Option<JobSnapshot> {
        self.state.read().current.as_ref().map(TranscodeJob::snapshot)
    }

    /// Cheap clone: the payload is reference-counted.
    pub fn result(&self) -> Option<TranscodeResult> {
        self.state.read().result.clone()
    }

    /// Job and result read together.
    pub fn view(&self) -> (Option<JobSnapshot>, Option<TranscodeResult>) {
        let state = self.state.read();
        (
            state.current.as_ref().map(TranscodeJob::snapshot),
            state.result.clone(),
        )
    }
}

/// Validate an upload and start its job in the background.
///
/// Checks run in order: media type, engine readiness, then the single-job
/// gate. A rejection creates no job.
pub fn submit(ctx: &AppContext, upload: UploadedFile) -> ow_core::Result<JobSnapshot> {
    let kind = upload.kind()?;
    let engine = ctx.session.engine()?;
    let permit = ctx.gate.try_acquire()?;

    let job = TranscodeJob::start(JobId::new(), &upload, kind);
    let snapshot = job.snapshot();
    ctx.board.begin(job);

    ctx.event_bus.broadcast(EventPayload::JobStarted {
        job_id: snapshot.id,
        kind,
        file_name: upload.name().to_string(),
    });

    tokio::spawn(run_job(ctx.clone(), engine, upload, snapshot.id, permit));
    Ok(snapshot)
}

/// Run one job to completion, mirroring its updates onto the board and the
/// event bus. The permit is released only after the final update is applied.
pub async fn run_job(
    ctx: AppContext,
    engine: Arc<dyn CodecEngine>,
    upload: UploadedFile,
    job_id: JobId,
    permit: JobPermit,
) -> JobOutcome {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let transcoder = Transcoder::new(engine);

    let work = async move {
        let outcome = transcoder.run(job_id, &upload, &tx).await;
        drop(tx);
        outcome
    };

    let forward = async {
        let mut last_ratio: Option<f64> = None;
        while let Some(update) = rx.recv().await {
            ctx.board.apply(&update);
            if let Some(payload) = to_event(job_id, &update, &mut last_ratio) {
                ctx.event_bus.broadcast(payload);
            }
        }
    };

    let (outcome, ()) = tokio::join!(work, forward);
    drop(permit);
    outcome
}

fn to_event(
    job_id: JobId,
    update: &JobUpdate,
    last_ratio: &mut Option<f64>,
) -> Option<EventPayload> {
    match update {
        JobUpdate::Started => None,
        JobUpdate::Progress { ratio, message } => {
            if last_ratio.is_some_and(|last| ratio - last < PROGRESS_STEP) {
                return None;
            }
            *last_ratio = Some(*ratio);
            Some(EventPayload::JobProgress {
                job_id,
                ratio: *ratio,
                message: message.clone(),
            })
        }
        JobUpdate::Finished(JobOutcome::Succeeded(result)) => Some(EventPayload::JobSucceeded {
            job_id,
            file_name: result.file_name.clone(),
            size: result.size(),
        }),
        JobUpdate::Finished(JobOutcome::NoOutput) => Some(EventPayload::JobNoOutput { job_id }),
        JobUpdate::Finished(JobOutcome::Failed(error)) => Some(EventPayload::JobFailed {
            job_id,
            error: error.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ow_core::MediaKind;

    fn upload() -> UploadedFile {
        UploadedFile::new("a.mp3", "audio/mpeg", vec![1, 2])
    }

    #[test]
    fn board_keeps_result_until_next_success() {
        let board = JobBoard::new();
        let first = upload();
        board.begin(TranscodeJob::start(JobId::new(), &first, MediaKind::Audio));
        let result = TranscodeResult::for_input(&first, MediaKind::Audio, vec![7u8; 3]);
        board.apply(&JobUpdate::Finished(JobOutcome::Succeeded(result)));
        assert_eq!(board.result().unwrap().size(), 3);

        board.begin(TranscodeJob::start(JobId::new(), &first, MediaKind::Audio));
        board.apply(&JobUpdate::Finished(JobOutcome::NoOutput));
        assert!(board.result().is_some());
        assert_eq!(
            board.current().unwrap().phase,
            ow_pipeline::JobPhase::NoOutput
        );
    }

    #[test]
    fn view_pairs_finished_job_with_its_result() {
        let board = Arc::new(JobBoard::new());
        let old = UploadedFile::new("old.mp3", "audio/mpeg", vec![1]);
        board.begin(TranscodeJob::start(JobId::new(), &old, MediaKind::Audio));
        board.apply(&JobUpdate::Finished(JobOutcome::Succeeded(
            TranscodeResult::for_input(&old, MediaKind::Audio, vec![0u8; 1]),
        )));

        let new = UploadedFile::new("new.mp3", "audio/mpeg", vec![2]);
        board.begin(TranscodeJob::start(JobId::new(), &new, MediaKind::Audio));

        let reader = {
            let board = board.clone();
            std::thread::spawn(move || {
                for _ in 0..1_000 {
                    let (job, result) = board.view();
                    let (job, result) = (job.unwrap(), result.unwrap());
                    if job.phase == ow_pipeline::JobPhase::Succeeded {
                        assert_eq!(result.file_name, "音割れnew.mp3");
                    }
                }
            })
        };
        board.apply(&JobUpdate::Finished(JobOutcome::Succeeded(
            TranscodeResult::for_input(&new, MediaKind::Audio, vec![0u8; 2]),
        )));
        reader.join().unwrap();

        let (job, result) = board.view();
        assert_eq!(job.unwrap().source_name, "new.mp3");
        assert_eq!(result.unwrap().size(), 2);
    }

    #[test]
    fn progress_events_are_throttled() {
        let id = JobId::new();
        let mut last = None;
        let update = |ratio: f64| JobUpdate::Progress {
            ratio,
            message: String::new(),
        };
        assert!(to_event(id, &update(0.0), &mut last).is_some());
        assert!(to_event(id, &update(0.005), &mut last).is_none());
        assert!(to_event(id, &update(0.02), &mut last).is_some());
        assert!(to_event(id, &JobUpdate::Started, &mut last).is_none());
    }

    #[test]
    fn terminal_updates_always_map_to_events() {
        let id = JobId::new();
        let mut last = Some(1.0);
        let event = to_event(
            id,
            &JobUpdate::Finished(JobOutcome::Failed("boom".into())),
            &mut last,
        )
        .unwrap();
        assert!(event.is_terminal());
    }
}
