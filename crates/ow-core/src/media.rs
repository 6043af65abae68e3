//! Media-domain types: the uploaded file, its kind, and the transcode result.

use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Prefix prepended to the input file name to form the suggested output name.
pub const OUTPUT_NAME_MARKER: &str = "音割れ";

/// Characters left unescaped by `encodeURIComponent`; everything else is
/// percent-encoded. The result never contains a path separator.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a string with the `encodeURIComponent` character set.
pub fn encode_uri_component(s: &str) -> String {
    utf8_percent_encode(s, URI_COMPONENT).to_string()
}

/// Filesystem-safe name under which an upload is staged in the engine.
pub fn encode_file_name(name: &str) -> String {
    encode_uri_component(name)
}

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// The two media categories the transcoder accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Classify a MIME type by its top-level type.
    ///
    /// Only `audio/*` and `video/*` are accepted; anything else is
    /// [`Error::Unsupported`].
    pub fn from_mime(mime: &str) -> Result<Self> {
        let top = mime
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match top.as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            _ => Err(Error::Unsupported(if mime.is_empty() {
                "(none)".to_string()
            } else {
                mime.to_string()
            })),
        }
    }

    /// Whether a MIME type would be accepted for transcoding.
    pub fn accepts(mime: &str) -> bool {
        Self::from_mime(mime).is_ok()
    }

    /// Extension used when the input name carries none.
    pub fn default_extension(self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Extension of a file name: the text after the last `.`.
///
/// Returns `None` when the name has no `.` or ends with one.
pub fn file_extension(name: &str) -> Option<&str> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

// ---------------------------------------------------------------------------
// UploadedFile
// ---------------------------------------------------------------------------

/// The raw file a user supplied. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    name: String,
    mime: String,
    data: Bytes,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Media kind of this upload, or [`Error::Unsupported`].
    pub fn kind(&self) -> Result<MediaKind> {
        MediaKind::from_mime(&self.mime)
    }

    /// Extension carried through to the output file.
    pub fn extension(&self, kind: MediaKind) -> String {
        file_extension(&self.name)
            .unwrap_or_else(|| kind.default_extension())
            .to_string()
    }

    /// Name under which the upload is staged in the engine file system.
    pub fn staged_name(&self) -> String {
        encode_file_name(&self.name)
    }
}

// ---------------------------------------------------------------------------
// TranscodeResult
// ---------------------------------------------------------------------------

/// Output of a completed job.
#[derive(Debug, Clone)]
pub struct TranscodeResult {
    pub kind: MediaKind,
    /// Same MIME type as the input.
    pub mime: String,
    /// Input name prefixed with [`OUTPUT_NAME_MARKER`].
    pub file_name: String,
    pub data: Bytes,
}

impl TranscodeResult {
    /// Wrap output bytes produced for `input`.
    pub fn for_input(input: &UploadedFile, kind: MediaKind, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            mime: input.mime().to_string(),
            file_name: format!("{OUTPUT_NAME_MARKER}{}", input.name()),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_audio_and_video() {
        assert_eq!(MediaKind::from_mime("audio/mpeg").unwrap(), MediaKind::Audio);
        assert_eq!(MediaKind::from_mime("audio/wav").unwrap(), MediaKind::Audio);
        assert_eq!(MediaKind::from_mime("video/mp4").unwrap(), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("Video/QuickTime").unwrap(), MediaKind::Video);
    }

    #[test]
    fn classify_rejects_other_types() {
        for mime in ["image/png", "text/plain", "application/octet-stream", "audiox/foo", ""] {
            let err = MediaKind::from_mime(mime).unwrap_err();
            assert!(matches!(err, Error::Unsupported(_)), "{mime} should be rejected");
        }
        assert!(!MediaKind::accepts("image/jpeg"));
    }

    #[test]
    fn extension_is_last_dot_segment() {
        assert_eq!(file_extension("song.mp3"), Some("mp3"));
        assert_eq!(file_extension("my.holiday.video.mov"), Some("mov"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn extension_falls_back_to_kind_default() {
        let upload = UploadedFile::new("recording", "audio/ogg", Vec::new());
        assert_eq!(upload.extension(MediaKind::Audio), "mp3");
        let upload = UploadedFile::new("clip", "video/webm", Vec::new());
        assert_eq!(upload.extension(MediaKind::Video), "mp4");
    }

    #[test]
    fn staged_name_matches_uri_component_encoding() {
        assert_eq!(encode_file_name("song.mp3"), "song.mp3");
        assert_eq!(encode_file_name("my song (1).mp3"), "my%20song%20(1).mp3");
        assert_eq!(encode_file_name("a/b.wav"), "a%2Fb.wav");
        assert_eq!(encode_file_name("音.mp3"), "%E9%9F%B3.mp3");
        assert_eq!(encode_file_name("it's~fine!*.ogg"), "it's~fine!*.ogg");
    }

    #[test]
    fn result_inherits_mime_and_prefixes_name() {
        let upload = UploadedFile::new("voice.m4a", "audio/mp4", vec![1, 2, 3]);
        let result = TranscodeResult::for_input(&upload, MediaKind::Audio, vec![9u8; 10]);
        assert_eq!(result.mime, "audio/mp4");
        assert_eq!(result.file_name, "音割れvoice.m4a");
        assert_eq!(result.size(), 10);
        assert_eq!(result.kind, MediaKind::Audio);
    }
}
