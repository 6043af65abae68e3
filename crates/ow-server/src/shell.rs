//! Presentation shell: the page and the view model it renders.
//!
//! The page holds no state of its own. It fetches [`ShellView`] and redraws
//! whenever a job event arrives.

use serde::Serialize;

use ow_core::config::{Operator, ShareConfig};
use ow_core::media::encode_uri_component;
use ow_core::{format_bytes, MediaKind, TranscodeResult};
use ow_engine::EngineStatus;
use ow_pipeline::{JobPhase, JobSnapshot};

use crate::context::AppContext;

/// The single page.
pub const INDEX_HTML: &str = include_str!("../assets/index.html");

pub const INSTRUCTIONS: &str = "音声・動画ファイルをアップロードすることで、「音割れポッター」のように\
大音量で音割れしている音声・動画ファイルを生成できます。\n\
再生する際は、十分に音量を下げてから再生してください。";

pub const NOTICE: &str =
    "アップロードしたファイルはこのサーバー上で処理され、処理が終わるとメモリからも破棄されます。";

pub const BANNER_MEMORY: &str = "メモリが不足しているため変換エンジンを起動できませんでした。\
他のアプリケーションを終了するか、サーバーを再起動してからお試しください。";

pub const BANNER_UNSUPPORTED: &str =
    "この環境では変換エンジンを起動できません。ffmpeg がインストールされているか確認してください。";

const TWEET_INTENT: &str = "https://twitter.com/intent/tweet?text=";

/// Where the page fetches the result bytes.
pub const RESULT_URL: &str = "/api/result";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    Memory,
    Unsupported,
}

/// Persistent warning shown when the engine failed to start.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Banner {
    pub kind: BannerKind,
    pub text: String,
}

impl Banner {
    /// Pick the copy for an initialization failure message.
    pub fn for_failure(message: &str) -> Self {
        if message.to_lowercase().contains("memory") {
            Self {
                kind: BannerKind::Memory,
                text: BANNER_MEMORY.to_string(),
            }
        } else {
            Self {
                kind: BannerKind::Unsupported,
                text: BANNER_UNSUPPORTED.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ProgressView {
    pub ratio: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ResultView {
    pub kind: MediaKind,
    pub mime: String,
    pub name: String,
    pub size: u64,
    /// `size` in the largest fitting unit, e.g. `1.5 KB`.
    pub size_label: String,
    pub url: String,
}

impl ResultView {
    fn new(result: &TranscodeResult) -> Self {
        Self {
            kind: result.kind,
            mime: result.mime.clone(),
            name: result.file_name.clone(),
            size: result.size(),
            size_label: format_bytes(result.size()),
            url: RESULT_URL.to_string(),
        }
    }
}

/// Payload for the platform's native share sheet.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ShareView {
    pub file_name: String,
    pub mime: String,
    pub caption: String,
    pub url: String,
}

/// Everything the page renders.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ShellView {
    pub instructions: String,
    pub notice: String,
    pub intent_url: String,
    pub engine: EngineStatus,
    pub banner: Option<Banner>,
    pub busy: bool,
    pub picker_enabled: bool,
    pub progress: Option<ProgressView>,
    pub job: Option<JobSnapshot>,
    pub result: Option<ResultView>,
    pub share: Option<ShareView>,
    pub operator: Option<Operator>,
}

/// Social-share intent link pre-filled with the configured text.
pub fn intent_url(share: &ShareConfig) -> String {
    format!("{TWEET_INTENT}{}", encode_uri_component(&share.intent_text()))
}

impl ShellView {
    /// Build the view from live state. `can_share_files` is the page's report
    /// of native file-share support.
    pub fn build(ctx: &AppContext, can_share_files: bool) -> Self {
        let engine = ctx.session.status();
        let busy = ctx.gate.is_busy();
        let (job, result) = ctx.board.view();

        let progress = job
            .as_ref()
            .filter(|j| j.phase == JobPhase::Running)
            .map(|j| ProgressView {
                ratio: j.ratio,
                message: j.message.clone(),
            });

        let share = match result {
            Some(ref r) if can_share_files => Some(ShareView {
                file_name: r.file_name.clone(),
                mime: r.mime.clone(),
                caption: ctx.config.share.caption(),
                url: RESULT_URL.to_string(),
            }),
            _ => None,
        };

        Self {
            instructions: INSTRUCTIONS.to_string(),
            notice: NOTICE.to_string(),
            intent_url: intent_url(&ctx.config.share),
            banner: ctx.session.failure().map(|msg| Banner::for_failure(&msg)),
            engine,
            busy,
            picker_enabled: !busy,
            progress,
            job,
            result: result.as_ref().map(ResultView::new),
            share,
            operator: ctx.config.share.operator.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ow_core::config::Config;
    use ow_core::{JobId, UploadedFile};
    use ow_engine::{EngineSession, ToolRegistry};
    use ow_pipeline::{JobOutcome, JobUpdate, TranscodeJob};

    fn ctx(session: EngineSession) -> AppContext {
        AppContext::new(
            Config::default(),
            Arc::new(session),
            Arc::new(ToolRegistry::default()),
        )
    }

    fn publish_result(ctx: &AppContext) {
        let upload = UploadedFile::new("v.mp4", "video/mp4", vec![0u8; 4]);
        ctx.board
            .begin(TranscodeJob::start(JobId::new(), &upload, MediaKind::Video));
        let result = TranscodeResult::for_input(&upload, MediaKind::Video, vec![0u8; 1536]);
        ctx.board
            .apply(&JobUpdate::Finished(JobOutcome::Succeeded(result)));
    }

    #[test]
    fn banner_copy_depends_on_memory() {
        assert_eq!(
            Banner::for_failure("Cannot allocate MEMORY").kind,
            BannerKind::Memory
        );
        assert_eq!(
            Banner::for_failure("ffmpeg not found").kind,
            BannerKind::Unsupported
        );
    }

    #[test]
    fn failed_engine_shows_banner() {
        let view = ShellView::build(&ctx(EngineSession::failed("out of memory")), false);
        let banner = view.banner.unwrap();
        assert_eq!(banner.kind, BannerKind::Memory);
        assert_eq!(banner.text, BANNER_MEMORY);
    }

    #[test]
    fn loading_engine_shows_no_banner() {
        let view = ShellView::build(&ctx(EngineSession::new()), true);
        assert!(view.banner.is_none());
        assert!(view.picker_enabled);
        assert!(view.result.is_none());
        assert!(view.share.is_none());
    }

    #[test]
    fn share_needs_capability_and_result() {
        let ctx = ctx(EngineSession::new());
        assert!(ShellView::build(&ctx, true).share.is_none());

        publish_result(&ctx);
        assert!(ShellView::build(&ctx, false).share.is_none());

        let view = ShellView::build(&ctx, true);
        let share = view.share.unwrap();
        assert_eq!(share.file_name, "音割れv.mp4");
        assert_eq!(share.caption, "#音割れメーカー https://otoware-maker.vercel.app");
    }

    #[test]
    fn result_carries_size_label() {
        let ctx = ctx(EngineSession::new());
        publish_result(&ctx);
        let result = ShellView::build(&ctx, false).result.unwrap();
        assert_eq!(result.size, 1536);
        assert_eq!(result.size_label, "1.5 KB");
        assert_eq!(result.kind, MediaKind::Video);
        assert_eq!(result.mime, "video/mp4");
    }

    #[test]
    fn busy_hides_picker_and_shows_progress() {
        let ctx = ctx(EngineSession::new());
        let _permit = ctx.gate.try_acquire().unwrap();
        let upload = UploadedFile::new("a.wav", "audio/wav", vec![0u8; 4]);
        ctx.board
            .begin(TranscodeJob::start(JobId::new(), &upload, MediaKind::Audio));
        ctx.board.apply(&JobUpdate::Progress {
            ratio: 0.4,
            message: "size=12kB time=00:00:02.00".into(),
        });

        let view = ShellView::build(&ctx, false);
        assert!(view.busy);
        assert!(!view.picker_enabled);
        let progress = view.progress.unwrap();
        assert_eq!(progress.ratio, 0.4);
        assert_eq!(progress.message, "size=12kB time=00:00:02.00");
    }

    #[test]
    fn footer_credits_configured_operator() {
        let view = ShellView::build(&ctx(EngineSession::new()), false);
        let operator = view.operator.unwrap();
        assert_eq!(operator.name, "barley_ural");
        assert_eq!(operator.url, "https://twitter.com/barley_ural");

        let mut config = Config::default();
        config.share.operator = None;
        let hidden = AppContext::new(
            config,
            Arc::new(EngineSession::new()),
            Arc::new(ToolRegistry::default()),
        );
        assert!(ShellView::build(&hidden, false).operator.is_none());
    }

    #[test]
    fn intent_url_is_encoded() {
        let url = intent_url(&ShareConfig::default());
        assert_eq!(
            url,
            "https://twitter.com/intent/tweet?text=\
             %E9%9F%B3%E5%89%B2%E3%82%8C%E3%83%A1%E3%83%BC%E3%82%AB%E3%83%BC\
             %0Ahttps%3A%2F%2Fotoware-maker.vercel.app"
        );
    }
}
