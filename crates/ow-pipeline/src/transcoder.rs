//! Runs one upload through its [`Plan`] on a [`CodecEngine`].

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use ow_core::{JobId, TranscodeResult, UploadedFile};
use ow_engine::{CodecEngine, EngineSignal};

use crate::job::{JobOutcome, JobUpdate};
use crate::plan::Plan;

/// Sender side of a job's update stream.
pub type UpdateSender = mpsc::UnboundedSender<JobUpdate>;

/// Progress across the whole plan plus the latest log line.
#[derive(Default)]
struct Tracker {
    ratio: f64,
    message: String,
}

/// Drives jobs on a shared engine. Callers must not run two jobs at once.
#[derive(Clone)]
pub struct Transcoder {
    engine: Arc<dyn CodecEngine>,
}

impl Transcoder {
    pub fn new(engine: Arc<dyn CodecEngine>) -> Self {
        Self { engine }
    }

    /// Run the job for `upload` to completion.
    ///
    /// Sends `Started`, any number of `Progress` updates, then exactly one
    /// `Finished` carrying the returned outcome. A closed receiver is not an
    /// error; the job still runs to the end.
    pub async fn run(
        &self,
        job_id: JobId,
        upload: &UploadedFile,
        updates: &UpdateSender,
    ) -> JobOutcome {
        let _ = updates.send(JobUpdate::Started);
        tracing::info!(
            job_id = %job_id,
            file = upload.name(),
            mime = upload.mime(),
            size = upload.len(),
            "Transcode started"
        );

        let outcome = match self.execute(upload, updates).await {
            Ok(Some(result)) => {
                tracing::info!(
                    job_id = %job_id,
                    output = %result.file_name,
                    size = result.size(),
                    "Transcode completed"
                );
                JobOutcome::Succeeded(result)
            }
            Ok(None) => {
                tracing::info!(job_id = %job_id, "Transcode produced no output");
                JobOutcome::NoOutput
            }
            Err(e) => {
                let error_msg = e.to_string();
                tracing::error!(job_id = %job_id, error = %error_msg, "Transcode failed");
                JobOutcome::Failed(error_msg)
            }
        };

        let _ = updates.send(JobUpdate::Finished(outcome.clone()));
        outcome
    }

    /// `Ok(None)` means a step ran but left nothing to read back.
    async fn execute(
        &self,
        upload: &UploadedFile,
        updates: &UpdateSender,
    ) -> ow_core::Result<Option<TranscodeResult>> {
        let plan = Plan::for_upload(upload)?;
        let staged = upload.staged_name();

        // Outputs of an earlier job must never be read back as ours. Cleared
        // before staging: the input may share a name with an output.
        for name in plan.outputs() {
            self.engine.discard(name).await?;
        }

        self.engine.write_input(&staged, upload.data()).await?;

        let total = plan.steps.len() as f64;
        let tracker = Mutex::new(Tracker::default());

        for (i, step) in plan.steps.iter().enumerate() {
            tracing::debug!(step = step.label, "Running step {}/{}", i + 1, plan.steps.len());

            let sink = |signal: EngineSignal| {
                let mut t = tracker.lock();
                match signal {
                    EngineSignal::Progress(r) => t.ratio = (i as f64 + r.clamp(0.0, 1.0)) / total,
                    EngineSignal::Log(line) => t.message = line,
                }
                let _ = updates.send(JobUpdate::Progress {
                    ratio: t.ratio,
                    message: t.message.clone(),
                });
            };

            self.engine
                .run_command(&step.args, &sink)
                .await
                .map_err(|e| ow_core::Error::pipeline(step.label, e.to_string()))?;

            if !self.engine.contains(&step.output).await {
                tracing::warn!(step = step.label, "Step produced no {}", step.output);
                return Ok(None);
            }
        }

        match self.engine.read_output(plan.output()).await {
            Ok(bytes) => Ok(Some(TranscodeResult::for_input(upload, plan.kind, bytes))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ow_core::MediaKind;
    use ow_engine::SignalSink;
    use std::collections::HashMap;

    /// In-memory engine: each command "writes" its last argument.
    #[derive(Default)]
    struct FakeEngine {
        files: Mutex<HashMap<String, Vec<u8>>>,
        commands: Mutex<Vec<Vec<String>>>,
        fail_on: Option<usize>,
        skip_output: bool,
        /// Fail like ffmpeg when an `-i` file is missing.
        check_inputs: bool,
    }

    #[async_trait]
    impl CodecEngine for FakeEngine {
        async fn write_input(&self, name: &str, bytes: &[u8]) -> ow_core::Result<()> {
            self.files.lock().insert(name.to_string(), bytes.to_vec());
            Ok(())
        }

        async fn run_command(&self, args: &[String], sink: SignalSink<'_>) -> ow_core::Result<()> {
            let index = {
                let mut commands = self.commands.lock();
                commands.push(args.to_vec());
                commands.len() - 1
            };
            if self.fail_on == Some(index) {
                return Err(ow_core::Error::tool("ffmpeg", "Invalid data found"));
            }
            if self.check_inputs {
                let files = self.files.lock();
                let missing = args
                    .windows(2)
                    .filter(|pair| pair[0] == "-i")
                    .find(|pair| !files.contains_key(&pair[1]));
                if let Some(pair) = missing {
                    return Err(ow_core::Error::tool(
                        "ffmpeg",
                        format!("{}: No such file or directory", pair[1]),
                    ));
                }
            }
            sink(EngineSignal::Log(format!("running {index}")));
            sink(EngineSignal::Progress(0.5));
            sink(EngineSignal::Progress(1.0));
            if !self.skip_output {
                let output = args.last().cloned().unwrap_or_default();
                self.files.lock().insert(output, b"boosted".to_vec());
            }
            Ok(())
        }

        async fn read_output(&self, name: &str) -> ow_core::Result<Vec<u8>> {
            self.files
                .lock()
                .get(name)
                .cloned()
                .ok_or_else(|| ow_core::Error::not_found("engine file", name))
        }

        async fn contains(&self, name: &str) -> bool {
            self.files.lock().contains_key(name)
        }

        async fn discard(&self, name: &str) -> ow_core::Result<()> {
            self.files.lock().remove(name);
            Ok(())
        }
    }

    async fn run(engine: Arc<FakeEngine>, upload: UploadedFile) -> (JobOutcome, Vec<JobUpdate>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = Transcoder::new(engine).run(JobId::new(), &upload, &tx).await;
        drop(tx);
        let mut updates = Vec::new();
        while let Some(u) = rx.recv().await {
            updates.push(u);
        }
        (outcome, updates)
    }

    #[tokio::test]
    async fn audio_job_succeeds() {
        let engine = Arc::new(FakeEngine::default());
        let upload = UploadedFile::new("song.mp3", "audio/mpeg", vec![1, 2, 3]);
        let (outcome, updates) = run(engine.clone(), upload).await;

        let result = outcome.result().expect("result");
        assert_eq!(result.mime, "audio/mpeg");
        assert_eq!(result.file_name, "音割れsong.mp3");
        assert_eq!(result.kind, MediaKind::Audio);
        assert_eq!(&result.data[..], b"boosted");

        let commands = engine.commands.lock();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].contains(&"volume=91dB".to_string()));
        assert_eq!(commands[1].last().map(String::as_str), Some("output.mp3"));

        assert!(matches!(updates.first(), Some(JobUpdate::Started)));
        assert!(matches!(
            updates.last(),
            Some(JobUpdate::Finished(JobOutcome::Succeeded(_)))
        ));
    }

    #[tokio::test]
    async fn progress_spans_the_whole_plan() {
        let engine = Arc::new(FakeEngine::default());
        let upload = UploadedFile::new("clip.mp4", "video/mp4", vec![0]);
        let (_, updates) = run(engine, upload).await;

        let ratios: Vec<f64> = updates
            .iter()
            .filter_map(|u| match u {
                JobUpdate::Progress { ratio, .. } => Some(*ratio),
                _ => None,
            })
            .collect();
        assert!(ratios.contains(&0.25));
        assert!(ratios.contains(&0.5));
        assert!(ratios.contains(&0.75));
        assert_eq!(ratios.last(), Some(&1.0));
        assert!(ratios.windows(2).all(|w| w[0] <= w[1]));

        let last_message = updates.iter().rev().find_map(|u| match u {
            JobUpdate::Progress { message, .. } => Some(message.clone()),
            _ => None,
        });
        assert_eq!(last_message.as_deref(), Some("running 1"));
    }

    #[tokio::test]
    async fn missing_output_ends_without_error() {
        let engine = Arc::new(FakeEngine {
            skip_output: true,
            ..FakeEngine::default()
        });
        let upload = UploadedFile::new("silent.mp4", "video/mp4", vec![0]);
        let (outcome, _) = run(engine.clone(), upload).await;
        assert!(matches!(outcome, JobOutcome::NoOutput));
        // Stops after the step that wrote nothing.
        assert_eq!(engine.commands.lock().len(), 1);
    }

    #[tokio::test]
    async fn stale_output_is_not_reused() {
        let engine = Arc::new(FakeEngine {
            skip_output: true,
            ..FakeEngine::default()
        });
        engine
            .files
            .lock()
            .insert("output.mp3".into(), b"previous job".to_vec());
        engine
            .files
            .lock()
            .insert("step1.wav".into(), b"previous job".to_vec());

        let upload = UploadedFile::new("next.mp3", "audio/mpeg", vec![0]);
        let (outcome, _) = run(engine, upload).await;
        assert!(matches!(outcome, JobOutcome::NoOutput));
    }

    #[tokio::test]
    async fn input_named_like_output_survives_cleanup() {
        let engine = Arc::new(FakeEngine {
            check_inputs: true,
            ..FakeEngine::default()
        });
        let upload = UploadedFile::new("output.mp3", "audio/mpeg", vec![7]);
        let (outcome, _) = run(engine.clone(), upload).await;

        let result = outcome.result().expect("result");
        assert_eq!(result.file_name, "音割れoutput.mp3");
        assert_eq!(engine.commands.lock()[0][1], "output.mp3");
    }

    #[tokio::test]
    async fn video_named_like_output_survives_cleanup() {
        let engine = Arc::new(FakeEngine {
            check_inputs: true,
            ..FakeEngine::default()
        });
        let upload = UploadedFile::new("output.mp4", "video/mp4", vec![7]);
        let (outcome, _) = run(engine, upload).await;
        assert!(outcome.result().is_some(), "unexpected outcome: {outcome:?}");
    }

    #[tokio::test]
    async fn command_failure_fails_the_job() {
        let engine = Arc::new(FakeEngine {
            fail_on: Some(1),
            ..FakeEngine::default()
        });
        let upload = UploadedFile::new("song.ogg", "audio/ogg", vec![0]);
        let (outcome, updates) = run(engine, upload).await;
        match outcome {
            JobOutcome::Failed(msg) => {
                assert!(msg.contains("encode"), "{msg}");
                assert!(msg.contains("Invalid data found"), "{msg}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        let finished = updates
            .iter()
            .filter(|u| matches!(u, JobUpdate::Finished(_)))
            .count();
        assert_eq!(finished, 1);
    }

    #[tokio::test]
    async fn staged_name_is_encoded() {
        let engine = Arc::new(FakeEngine::default());
        let upload = UploadedFile::new("a b/c.wav", "audio/wav", vec![7]);
        run(engine.clone(), upload).await;
        assert!(engine.files.lock().contains_key("a%20b%2Fc.wav"));
        assert_eq!(engine.commands.lock()[0][1], "a%20b%2Fc.wav");
    }

    #[tokio::test]
    async fn closed_receiver_does_not_stop_the_job() {
        let engine = Arc::new(FakeEngine::default());
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let upload = UploadedFile::new("x.wav", "audio/wav", vec![1]);
        let outcome = Transcoder::new(engine).run(JobId::new(), &upload, &tx).await;
        assert!(outcome.result().is_some());
    }
}
