//! Chrome DevTools Protocol capture strategies

use crate::capture::{CaptureJob, CaptureStrategy};
use crate::{Config, Error, Result};
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use std::path::PathBuf;
use std::time::Duration;

/// Where the browser binary comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserSource {
    /// A binary the user already located; no discovery, no install
    Explicit(Option<PathBuf>),
    /// Let `headless_chrome` discover a binary (and download one when built
    /// with the `fetch` feature)
    Managed,
}

/// Capture strategy that launches a Chrome instance per attempt
///
/// The browser lives only for the duration of [`CaptureStrategy::attempt`]
/// and is dropped, killing the child process, on every return path.
pub struct ChromeStrategy {
    name: &'static str,
    source: BrowserSource,
    headless: bool,
}

impl ChromeStrategy {
    /// Headless Chrome from a pre-located binary
    pub fn explicit(path: Option<PathBuf>) -> Self {
        Self {
            name: "explicit-driver",
            source: BrowserSource::Explicit(path),
            headless: true,
        }
    }

    /// Headless Chrome from a discovered or downloaded binary
    pub fn managed() -> Self {
        Self {
            name: "managed-driver",
            source: BrowserSource::Managed,
            headless: true,
        }
    }

    /// Windowed Chrome, tried last so a human can see what the page does
    pub fn visible() -> Self {
        Self {
            name: "visible-fallback",
            source: BrowserSource::Managed,
            headless: false,
        }
    }

    pub fn source(&self) -> &BrowserSource {
        &self.source
    }

    pub fn is_headless(&self) -> bool {
        self.headless
    }

    fn binary(&self) -> Result<Option<PathBuf>> {
        match &self.source {
            BrowserSource::Explicit(None) => Err(Error::AutomationError(format!(
                "no browser binary configured (set browser_path or {})",
                crate::BROWSER_ENV
            ))),
            BrowserSource::Explicit(Some(path)) if !path.exists() => Err(Error::AutomationError(
                format!("browser binary {} does not exist", path.display()),
            )),
            BrowserSource::Explicit(Some(path)) => Ok(Some(path.clone())),
            BrowserSource::Managed => Ok(None),
        }
    }

    fn launch(&self, job: &CaptureJob) -> Result<Browser> {
        let launch_options = LaunchOptions::default_builder()
            .headless(self.headless)
            .sandbox(false)
            .path(self.binary()?)
            .window_size(Some((job.viewport.width, job.viewport.height)))
            // the settle wait happens with no CDP traffic
            .idle_browser_timeout(job.timeout + job.settle + Duration::from_secs(5))
            .build()
            .map_err(|e| Error::AutomationError(format!("Failed to build launch options: {}", e)))?;

        Browser::new(launch_options)
            .map_err(|e| Error::AutomationError(format!("Failed to launch browser: {}", e)))
    }
}

impl CaptureStrategy for ChromeStrategy {
    fn name(&self) -> &str {
        self.name
    }

    fn attempt(&self, job: &CaptureJob) -> Result<Vec<u8>> {
        let browser = self.launch(job)?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::AutomationError(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(job.timeout);

        let captured = (|| -> anyhow::Result<Vec<u8>> {
            tab.navigate_to(&job.url)?;
            tab.wait_until_navigated()?;

            // Slides keep rendering after load and offer no readiness signal
            debug!("{} settling for {:?}", self.name, job.settle);
            std::thread::sleep(job.settle);

            tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
        })();

        if let Err(e) = tab.close(true) {
            debug!("{} could not close tab: {}", self.name, e);
        }
        drop(tab);
        drop(browser);

        captured.map_err(Error::from)
    }
}

/// Explicit binary, then managed binary, then a visible window.
pub fn default_strategies(config: &Config) -> Vec<Box<dyn CaptureStrategy>> {
    vec![
        Box::new(ChromeStrategy::explicit(config.browser_path.clone())),
        Box::new(ChromeStrategy::managed()),
        Box::new(ChromeStrategy::visible()),
    ]
}
