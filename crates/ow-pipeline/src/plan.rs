//! Fixed command plans.
//!
//! Every input of a kind gets the same two-step plan. Step one boosts the
//! audio by [`GAIN_DB`] into an uncompressed intermediate; step two encodes
//! that intermediate into the output container (for video, muxed back with the
//! untouched video stream).

use ow_core::{MediaKind, UploadedFile};

/// Gain applied to the audio track, in decibels.
pub const GAIN_DB: u32 = 91;

/// Name of the uncompressed intermediate produced by step one.
pub const INTERMEDIATE: &str = "step1.wav";

/// Name of the final output for a given extension.
pub fn output_name(ext: &str) -> String {
    format!("output.{ext}")
}

/// One engine invocation and the file it is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub label: &'static str,
    pub args: Vec<String>,
    pub output: String,
}

/// The ordered steps for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub kind: MediaKind,
    pub steps: Vec<Step>,
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

impl Plan {
    /// Build the plan for `kind`, reading the staged input `staged` and
    /// writing `output.<ext>`.
    pub fn for_kind(kind: MediaKind, staged: &str, ext: &str) -> Self {
        let volume = format!("volume={GAIN_DB}dB");
        let output = output_name(ext);

        let steps = match kind {
            MediaKind::Audio => vec![
                Step {
                    label: "boost",
                    args: args(&[
                        "-i", staged, "-af", volume.as_str(), "-c:a", "pcm_s16le", INTERMEDIATE,
                    ]),
                    output: INTERMEDIATE.to_string(),
                },
                Step {
                    label: "encode",
                    args: args(&["-i", INTERMEDIATE, output.as_str()]),
                    output: output.clone(),
                },
            ],
            MediaKind::Video => vec![
                Step {
                    label: "boost",
                    args: args(&[
                        "-i", staged, "-vn", "-af", volume.as_str(), "-c:a", "pcm_s16le", INTERMEDIATE,
                    ]),
                    output: INTERMEDIATE.to_string(),
                },
                Step {
                    label: "mux",
                    args: args(&[
                        "-i", staged, "-i", INTERMEDIATE, "-c:v", "copy", "-c:a", "aac", "-map",
                        "0:v:0", "-map", "1:a:0", output.as_str(),
                    ]),
                    output: output.clone(),
                },
            ],
        };

        Self { kind, steps }
    }

    /// Classify `upload` and build its plan.
    ///
    /// # Errors
    ///
    /// Returns [`ow_core::Error::Unsupported`] for anything but audio or video.
    pub fn for_upload(upload: &UploadedFile) -> ow_core::Result<Self> {
        let kind = upload.kind()?;
        Ok(Self::for_kind(kind, &upload.staged_name(), &upload.extension(kind)))
    }

    /// The file the last step writes.
    pub fn output(&self) -> &str {
        self.steps
            .last()
            .map(|s| s.output.as_str())
            .unwrap_or_default()
    }

    /// Every file the plan writes, in order.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.output.as_str())
    }
}
