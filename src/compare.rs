//! Baseline vs. styled deck comparison

use crate::capture::{CaptureAttempt, CapturePipeline};
use crate::client::{self, ArtifactClient, ArtifactResult, ComparisonPair, HttpTransport, Transport};
use crate::export::{self, SavedThumbnail};
use crate::style::{self, StyleSpec};
use crate::CaptureView;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;

/// Report of one comparison run. Written once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub prompt: String,
    pub style: StyleSpec,
    pub before: ArtifactResult,
    pub after: ArtifactResult,
    pub before_capture: Option<CaptureAttempt>,
    pub after_capture: Option<CaptureAttempt>,
    pub before_thumbnail: Option<ThumbnailOutcome>,
    pub after_thumbnail: Option<ThumbnailOutcome>,
    pub created_at: DateTime<Utc>,
}

/// What happened to a created deck's thumbnail link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ThumbnailOutcome {
    Saved(SavedThumbnail),
    Failed { url: String, reason: String },
}

impl ComparisonResult {
    pub fn both_created(&self) -> bool {
        self.before.success && self.after.success
    }

    /// True when both decks were captured and the images are byte-identical,
    /// i.e. the styling made no visible difference.
    pub fn captures_identical(&self) -> bool {
        let digest = |c: &Option<CaptureAttempt>| c.as_ref().and_then(|a| a.digest().map(str::to_string));
        match (digest(&self.before_capture), digest(&self.after_capture)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

struct CaptureStage {
    pipeline: CapturePipeline,
    view: CaptureView,
    output_dir: PathBuf,
}

/// Drives the client for a baseline and a styled deck and optionally
/// captures each one that was created.
///
/// Never stops early: a failed deck is reported and simply not captured.
pub struct ComparisonOrchestrator<T: Transport = HttpTransport> {
    client: ArtifactClient<T>,
    capture: Option<CaptureStage>,
    thumbnail_dir: Option<PathBuf>,
}

impl<T: Transport> ComparisonOrchestrator<T> {
    pub fn new(client: ArtifactClient<T>) -> Self {
        Self {
            client,
            capture: None,
            thumbnail_dir: None,
        }
    }

    /// Capture each created deck's `view` into `output_dir`.
    pub fn with_capture(mut self, pipeline: CapturePipeline, view: CaptureView, output_dir: impl Into<PathBuf>) -> Self {
        self.capture = Some(CaptureStage {
            pipeline,
            view,
            output_dir: output_dir.into(),
        });
        self
    }

    /// Save each created deck's `thumbnailLink` into `output_dir`.
    pub fn with_thumbnails(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.thumbnail_dir = Some(output_dir.into());
        self
    }

    pub fn client(&self) -> &ArtifactClient<T> {
        &self.client
    }

    /// Capture log across all runs, empty when capture is disabled
    pub fn capture_attempts(&self) -> &[CaptureAttempt] {
        self.capture.as_ref().map(|c| c.pipeline.attempts()).unwrap_or(&[])
    }

    pub fn run(&mut self, prompt: &str) -> ComparisonResult {
        let style = style::extract(prompt);
        match (&style.font_pair, &style.color_palette) {
            (None, None) => info!("no style terms found in prompt"),
            (fonts, palette) => info!(
                "style: fonts={} palette={}",
                fonts.as_ref().map(|f| f.to_string()).unwrap_or_else(|| "-".into()),
                palette.as_ref().map(|p| p.hex_codes.join(",")).unwrap_or_else(|| "-".into())
            ),
        }

        let pair = self.client.create_comparison(prompt, &style);
        self.finish(prompt, style, pair)
    }

    /// Let the service build its own baseline/styled pair
    /// (`createFontComparison`), then capture as usual.
    pub fn run_server_side(&mut self) -> ComparisonResult {
        let pair = self.client.create_server_comparison();
        self.finish("", StyleSpec::default(), pair)
    }

    fn finish(&mut self, prompt: &str, style: StyleSpec, pair: crate::Result<ComparisonPair>) -> ComparisonResult {
        let ComparisonPair { before, after } = pair.unwrap_or_else(|e| {
            warn!("comparison aborted: {}", e);
            ComparisonPair {
                before: ArtifactResult::failure(client::UNREACHABLE),
                after: ArtifactResult::failure(client::UNREACHABLE),
            }
        });

        let before_capture = self.capture_one("before", &before);
        let after_capture = self.capture_one("after", &after);
        let before_thumbnail = self.thumbnail_one("before", &before);
        let after_thumbnail = self.thumbnail_one("after", &after);

        ComparisonResult {
            prompt: prompt.to_string(),
            style,
            before,
            after,
            before_capture,
            after_capture,
            before_thumbnail,
            after_thumbnail,
            created_at: Utc::now(),
        }
    }

    fn thumbnail_one(&self, role: &str, artifact: &ArtifactResult) -> Option<ThumbnailOutcome> {
        let dir = self.thumbnail_dir.as_ref()?;
        if !artifact.success {
            return None;
        }
        let Some(url) = artifact.thumbnail_url.as_deref() else {
            info!("{} deck has no thumbnail link", role);
            return None;
        };
        match export::download_thumbnail(self.client.transport(), url, role, dir) {
            Ok(saved) => Some(ThumbnailOutcome::Saved(saved)),
            Err(e) => {
                warn!("{} thumbnail download failed: {}", role, e);
                Some(ThumbnailOutcome::Failed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn capture_one(&mut self, role: &str, artifact: &ArtifactResult) -> Option<CaptureAttempt> {
        let stage = self.capture.as_mut()?;
        if !artifact.success {
            info!("skipping {} capture: deck was not created", role);
            return None;
        }
        let url = match stage.view {
            CaptureView::Public => artifact.public_url.as_deref(),
            CaptureView::Edit => artifact.edit_url.as_deref(),
        }?;
        Some(stage.pipeline.capture_tagged(Some(role), url, &stage.output_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureOutcome;

    fn captured(digest: &str) -> Option<CaptureAttempt> {
        Some(CaptureAttempt {
            strategy_name: "fake".into(),
            target_url: "https://example.com/pub".into(),
            outcome: CaptureOutcome::Success {
                file_path: PathBuf::from("x.png"),
                byte_size: 1,
                digest: digest.into(),
            },
        })
    }

    fn report(before_capture: Option<CaptureAttempt>, after_capture: Option<CaptureAttempt>) -> ComparisonResult {
        ComparisonResult {
            prompt: String::new(),
            style: StyleSpec::default(),
            before: ArtifactResult::created("b", None, &[]),
            after: ArtifactResult::created("a", None, &[]),
            before_capture,
            after_capture,
            before_thumbnail: None,
            after_thumbnail: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn identical_captures_need_both_sides() {
        assert!(report(captured("aa"), captured("aa")).captures_identical());
        assert!(!report(captured("aa"), captured("bb")).captures_identical());
        assert!(!report(captured("aa"), None).captures_identical());
        assert!(report(None, None).both_created());
    }
}
