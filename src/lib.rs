//! Deckshot
//!
//! Turns a free-form design prompt into a slide deck generated by a remote
//! creation service, captures an image of the result, and produces
//! baseline/styled pairs for side-by-side comparison.
//!
//! # Components
//!
//! - [`style`]: recovers a font pair and colour palette from prompt text
//! - [`client`]: typed request/response layer over the creation service
//! - [`capture`]: ordered fallback chain of screenshot strategies
//! - [`compare`]: drives the client twice and assembles a comparison report
//! - [`export`]: URL templates and export downloads
//!
//! # Example
//!
//! ```no_run
//! use deckshot::{ArtifactClient, ComparisonOrchestrator, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     endpoint_url: "https://script.example.com/exec".to_string(),
//!     ..Default::default()
//! };
//! config.validate()?;
//!
//! let client = ArtifactClient::from_config(&config)?;
//! let mut orchestrator = ComparisonOrchestrator::new(client);
//! let report = orchestrator.run("Pitch deck with Merriweather/Inter fonts");
//! println!("before ok: {}, after ok: {}", report.before.success, report.after.success);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod error;
pub use error::{Error, Result};

pub mod capture;
pub mod client;
pub mod compare;
pub mod export;
pub mod style;

// Chrome-backed capture strategies
#[cfg(feature = "cdp")]
pub mod cdp;

pub use capture::{CaptureAttempt, CaptureJob, CaptureOutcome, CapturePipeline, CaptureStrategy};
pub use client::{ArtifactClient, ArtifactRequest, ArtifactResult, ComparisonPair, HttpTransport, RemoteCall, Transport};
pub use compare::{ComparisonOrchestrator, ComparisonResult, ThumbnailOutcome};
pub use export::ExportFormat;
pub use style::{ColorPalette, FontPair, StyleSpec};

/// Environment variable read by the CLI for [`Config::endpoint_url`]
pub const ENDPOINT_ENV: &str = "DECKSHOT_ENDPOINT";
/// Environment variable read by the CLI for [`Config::browser_path`]
pub const BROWSER_ENV: &str = "DECKSHOT_BROWSER";

/// Runtime configuration shared by the client and the capture pipeline
///
/// Defaults follow what works against the hosted creation service:
/// - public views settle for 5s, editor views for 8s since the editor loads
///   far more client-side script
/// - comparison requests are spaced 2s apart to stay clear of rate limits
///
/// The settle intervals are blind waits. The creation service exposes no
/// readiness signal, so they are a tunable approximation.
///
/// # Examples
///
/// ```
/// let cfg = deckshot::Config::default();
/// assert!(cfg.edit_settle_ms > cfg.public_settle_ms);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Creation service endpoint receiving `{fn, args}` POSTs
    pub endpoint_url: String,
    /// Wait before capturing an unauthenticated (`/pub`) view
    pub public_settle_ms: u64,
    /// Wait before capturing an authenticated (`/edit`) view
    pub edit_settle_ms: u64,
    /// Formats for which export URLs are derived
    pub export_formats: Vec<ExportFormat>,
    /// Courtesy delay between the two comparison requests
    pub pacing_ms: u64,
    /// Timeout for each HTTP call to the service or an export URL
    pub request_timeout_ms: u64,
    /// Timeout for each browser automation step
    pub navigation_timeout_ms: u64,
    /// Pre-located browser binary for the explicit-driver strategy
    pub browser_path: Option<PathBuf>,
    /// Browser window size used for captures
    pub viewport: Viewport,
    /// Which view of a deck the comparison captures
    pub capture_view: CaptureView,
    /// Directory receiving capture and export files
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            public_settle_ms: 5000,
            edit_settle_ms: 8000,
            export_formats: vec![ExportFormat::Png, ExportFormat::Svg, ExportFormat::Pdf],
            pacing_ms: 2000,
            request_timeout_ms: 30000,
            navigation_timeout_ms: 30000,
            browser_path: None,
            viewport: Viewport::default(),
            capture_view: CaptureView::Public,
            output_dir: PathBuf::from("screenshots"),
        }
    }
}

impl Config {
    /// Load a JSON config file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint_url.trim().is_empty() {
            return Err(Error::ConfigError(format!(
                "endpoint_url is required (set it in the config file or {})",
                ENDPOINT_ENV
            )));
        }
        let parsed = url::Url::parse(&self.endpoint_url)
            .map_err(|e| Error::ConfigError(format!("endpoint_url {:?}: {}", self.endpoint_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::ConfigError(format!(
                "endpoint_url must be http(s), got {}",
                parsed.scheme()
            )));
        }
        if self.export_formats.is_empty() {
            return Err(Error::ConfigError("export_formats must not be empty".into()));
        }
        if self.request_timeout_ms == 0 || self.navigation_timeout_ms == 0 {
            return Err(Error::ConfigError("timeouts must be greater than zero".into()));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError("viewport dimensions must be non-zero".into()));
        }
        Ok(())
    }
}

/// Browser window dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
        }
    }
}

/// Which rendering of a deck to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureView {
    /// Published `/pub` view, reachable without signing in
    #[default]
    Public,
    /// Editor `/edit` view, needs an authenticated browser profile
    Edit,
}
