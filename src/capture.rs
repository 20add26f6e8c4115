//! Resilient screenshot capture
//!
//! A [`CapturePipeline`] owns an ordered list of [`CaptureStrategy`] objects
//! and tries them one at a time until one produces an image. Each strategy is
//! attempted at most once per capture. Every attempt, failed or not, is
//! appended to the pipeline's log; the value returned is the successful
//! attempt or, when everything failed, the last failure.

use crate::{Config, Viewport};
use log::{info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timestamp fragment used in capture and export file names
pub fn timestamp_tag() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// How much client-side work a view needs before it is worth capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewAccess {
    /// Published view, no sign-in
    Public,
    /// Editor or anything else that may need a signed-in session
    Authenticated,
}

impl ViewAccess {
    /// `/pub` paths are public; everything else, including unparseable
    /// URLs, gets the longer authenticated wait.
    pub fn from_url(target_url: &str) -> Self {
        match url::Url::parse(target_url) {
            Ok(parsed) if parsed.path().trim_end_matches('/').ends_with("/pub") => ViewAccess::Public,
            _ => ViewAccess::Authenticated,
        }
    }
}

/// Everything a strategy needs for one attempt
#[derive(Debug, Clone)]
pub struct CaptureJob {
    pub url: String,
    pub access: ViewAccess,
    /// Blind wait between navigation and screenshot
    pub settle: Duration,
    /// Upper bound for each automation step
    pub timeout: Duration,
    pub viewport: Viewport,
}

/// One way of driving a browser to an image of a page
///
/// Implementations navigate to `job.url`, sleep `job.settle`, and return the
/// PNG bytes of the viewport. Any fault is returned as an `Err`; the browser
/// must be released before returning on every path. The pipeline writes the
/// file, so strategies do no file I/O of their own.
pub trait CaptureStrategy {
    /// Short tag used in logs and file names
    fn name(&self) -> &str;

    fn attempt(&self, job: &CaptureJob) -> crate::Result<Vec<u8>>;
}

/// Result of one strategy attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureAttempt {
    pub strategy_name: String,
    pub target_url: String,
    pub outcome: CaptureOutcome,
}

impl CaptureAttempt {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CaptureOutcome::Success { .. })
    }

    /// SHA-256 of the captured file, if any
    pub fn digest(&self) -> Option<&str> {
        match &self.outcome {
            CaptureOutcome::Success { digest, .. } => Some(digest),
            CaptureOutcome::Failure { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CaptureOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        file_path: PathBuf,
        byte_size: u64,
        digest: String,
    },
    Failure {
        reason: String,
    },
}

/// Ordered fallback chain of capture strategies
pub struct CapturePipeline {
    strategies: Vec<Box<dyn CaptureStrategy>>,
    public_settle: Duration,
    edit_settle: Duration,
    timeout: Duration,
    viewport: Viewport,
    log: Vec<CaptureAttempt>,
}

impl CapturePipeline {
    pub fn new(config: &Config, strategies: Vec<Box<dyn CaptureStrategy>>) -> Self {
        Self {
            strategies,
            public_settle: Duration::from_millis(config.public_settle_ms),
            edit_settle: Duration::from_millis(config.edit_settle_ms),
            timeout: Duration::from_millis(config.navigation_timeout_ms),
            viewport: config.viewport,
            log: Vec::new(),
        }
    }

    /// Pipeline with the Chrome strategies: explicit binary, managed binary,
    /// then a visible window.
    #[cfg(feature = "cdp")]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, crate::cdp::default_strategies(config))
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Every attempt made so far, oldest first
    pub fn attempts(&self) -> &[CaptureAttempt] {
        &self.log
    }

    pub fn settle_for(&self, access: ViewAccess) -> Duration {
        match access {
            ViewAccess::Public => self.public_settle,
            ViewAccess::Authenticated => self.edit_settle,
        }
    }

    pub fn capture(&mut self, target_url: &str, out_dir: &Path) -> CaptureAttempt {
        self.capture_tagged(None, target_url, out_dir)
    }

    /// Capture with a role tag (e.g. `before`) in the output file name.
    pub fn capture_tagged(&mut self, role: Option<&str>, target_url: &str, out_dir: &Path) -> CaptureAttempt {
        if let Err(e) = std::fs::create_dir_all(out_dir) {
            return self.record_failure("pipeline", target_url, format!("cannot create {}: {}", out_dir.display(), e));
        }
        if self.strategies.is_empty() {
            return self.record_failure("pipeline", target_url, "no capture strategies configured".into());
        }

        let access = ViewAccess::from_url(target_url);
        let job = CaptureJob {
            url: target_url.to_string(),
            access,
            settle: self.settle_for(access),
            timeout: self.timeout,
            viewport: self.viewport,
        };

        let mut last = None;
        for strategy in &self.strategies {
            let name = strategy.name().to_string();
            info!("capturing {} with {} (settle {:?})", target_url, name, job.settle);

            let outcome = match strategy.attempt(&job) {
                Ok(bytes) if bytes.is_empty() => CaptureOutcome::Failure {
                    reason: "zero-byte capture".to_string(),
                },
                Ok(bytes) => {
                    let path = out_dir.join(capture_file_name(&timestamp_tag(), role, &name));
                    write_capture(&path, &bytes)
                }
                Err(e) => CaptureOutcome::Failure { reason: e.to_string() },
            };

            let attempt = CaptureAttempt {
                strategy_name: name,
                target_url: target_url.to_string(),
                outcome,
            };
            match &attempt.outcome {
                CaptureOutcome::Success { file_path, byte_size, .. } => {
                    info!("{} captured {} bytes to {}", attempt.strategy_name, byte_size, file_path.display());
                    self.log.push(attempt.clone());
                    return attempt;
                }
                CaptureOutcome::Failure { reason } => {
                    warn!("{} failed for {}: {}", attempt.strategy_name, target_url, reason);
                    self.log.push(attempt.clone());
                    last = Some(attempt);
                }
            }
        }

        match last {
            Some(attempt) => attempt,
            None => self.record_failure("pipeline", target_url, "no capture strategies configured".into()),
        }
    }

    fn record_failure(&mut self, strategy: &str, target_url: &str, reason: String) -> CaptureAttempt {
        warn!("capture of {} failed: {}", target_url, reason);
        let attempt = CaptureAttempt {
            strategy_name: strategy.to_string(),
            target_url: target_url.to_string(),
            outcome: CaptureOutcome::Failure { reason },
        };
        self.log.push(attempt.clone());
        attempt
    }
}

/// `{timestamp}_{role}_{strategy}.png`, role omitted when absent
pub fn capture_file_name(timestamp: &str, role: Option<&str>, strategy: &str) -> String {
    let mut name = String::from(timestamp);
    for part in role.into_iter().chain(std::iter::once(strategy)) {
        name.push('_');
        name.extend(part.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' }));
    }
    name.push_str(".png");
    name
}

fn write_capture(path: &Path, bytes: &[u8]) -> CaptureOutcome {
    match std::fs::write(path, bytes) {
        Ok(()) => CaptureOutcome::Success {
            file_path: path.to_path_buf(),
            byte_size: bytes.len() as u64,
            digest: hex::encode(Sha256::digest(bytes)),
        },
        Err(e) => CaptureOutcome::Failure {
            reason: format!("failed to write {}: {}", path.display(), e),
        },
    }
}
