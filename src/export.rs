//! Deck URL templates and export downloads
//!
//! URL derivation is pure string formatting. Downloads go through a
//! [`Transport`], so tests can substitute canned responses.

use crate::capture::timestamp_tag;
use crate::client::Transport;
use crate::{Error, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Base of every deck URL
pub const SLIDES_BASE_URL: &str = "https://docs.google.com/presentation/d";

/// Formats the export endpoint can render a deck into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Svg,
    Pdf,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Png, ExportFormat::Svg, ExportFormat::Pdf];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "svg" => Ok(ExportFormat::Svg),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(Error::ConfigError(format!("unknown export format: {}", other))),
        }
    }
}

pub fn export_url(artifact_id: &str, format: ExportFormat) -> String {
    format!("{}/{}/export?format={}", SLIDES_BASE_URL, artifact_id, format)
}

pub fn public_url(artifact_id: &str) -> String {
    format!("{}/{}/pub", SLIDES_BASE_URL, artifact_id)
}

pub fn edit_url(artifact_id: &str) -> String {
    format!("{}/{}/edit", SLIDES_BASE_URL, artifact_id)
}

/// A downloaded export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedFile {
    pub format: ExportFormat,
    pub url: String,
    pub path: PathBuf,
    pub byte_size: u64,
}

/// Download one export of `artifact_id` into `out_dir`.
///
/// 401, 403 and 404 mean the deck is not shared or publishing has not
/// propagated yet; they surface as [`Error::ExportUnavailable`] and are not
/// retried.
pub fn download<T>(transport: &T, artifact_id: &str, format: ExportFormat, out_dir: &Path) -> Result<ExportedFile>
where
    T: Transport + ?Sized,
{
    let url = export_url(artifact_id, format);
    let body = fetch(transport, &url)?;

    let path = out_dir.join(format!(
        "{}_{}.{}",
        timestamp_tag(),
        sanitize(artifact_id),
        format.extension()
    ));
    save(&path, &body)?;
    info!("exported {} ({} bytes) to {}", format, body.len(), path.display());

    Ok(ExportedFile {
        format,
        url,
        path,
        byte_size: body.len() as u64,
    })
}

/// A deck thumbnail saved to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedThumbnail {
    pub url: String,
    pub path: PathBuf,
    pub byte_size: u64,
}

/// Download the service-provided `thumbnail_url` of a deck as
/// `{timestamp}_{role}_thumbnail.{png|jpg}`.
///
/// Thumbnail links are served to the account that created the deck, so they
/// still work when the export endpoint refuses an unshared deck.
pub fn download_thumbnail<T>(transport: &T, thumbnail_url: &str, role: &str, out_dir: &Path) -> Result<SavedThumbnail>
where
    T: Transport + ?Sized,
{
    let body = fetch(transport, thumbnail_url)?;
    let extension = if body.starts_with(b"\x89PNG") { "png" } else { "jpg" };

    let path = out_dir.join(format!("{}_{}_thumbnail.{}", timestamp_tag(), sanitize(role), extension));
    save(&path, &body)?;
    info!("saved {} thumbnail ({} bytes) to {}", role, body.len(), path.display());

    Ok(SavedThumbnail {
        url: thumbnail_url.to_string(),
        path,
        byte_size: body.len() as u64,
    })
}

// GET a non-empty body; refusals map to ExportUnavailable.
fn fetch<T>(transport: &T, url: &str) -> Result<Vec<u8>>
where
    T: Transport + ?Sized,
{
    let response = transport.get(url)?;

    match response.status {
        401 | 403 | 404 => {
            warn!("{} refused with HTTP {}", url, response.status);
            return Err(Error::ExportUnavailable {
                status: response.status,
                url: url.to_string(),
            });
        }
        s if !response.is_success() => {
            return Err(Error::TransportError(format!("{} returned HTTP {}", url, s)));
        }
        _ => {}
    }

    if response.body.is_empty() {
        return Err(Error::TransportError(format!("{} returned an empty body", url)));
    }
    Ok(response.body)
}

fn save(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Download every format in turn; one failure does not stop the rest.
pub fn download_all<T>(
    transport: &T,
    artifact_id: &str,
    formats: &[ExportFormat],
    out_dir: &Path,
) -> Vec<(ExportFormat, Result<ExportedFile>)>
where
    T: Transport + ?Sized,
{
    formats
        .iter()
        .map(|&format| (format, download(transport, artifact_id, format, out_dir)))
        .collect()
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpResponse;
    use std::cell::RefCell;

    struct CannedGet {
        status: u16,
        body: Vec<u8>,
        seen: RefCell<Vec<String>>,
    }

    impl Transport for CannedGet {
        fn post_json(&self, _url: &str, _body: &serde_json::Value) -> Result<HttpResponse> {
            unreachable!("exports only GET")
        }

        fn get(&self, url: &str) -> Result<HttpResponse> {
            self.seen.borrow_mut().push(url.to_string());
            Ok(HttpResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    fn canned(status: u16, body: &[u8]) -> CannedGet {
        CannedGet {
            status,
            body: body.to_vec(),
            seen: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn url_templates() {
        assert_eq!(
            export_url("abc123", ExportFormat::Png),
            "https://docs.google.com/presentation/d/abc123/export?format=png"
        );
        assert_eq!(public_url("abc123"), "https://docs.google.com/presentation/d/abc123/pub");
        assert_eq!(edit_url("abc123"), "https://docs.google.com/presentation/d/abc123/edit");
    }

    #[test]
    fn derivation_is_stable() {
        for format in ExportFormat::ALL {
            assert_eq!(export_url("deck-1", format), export_url("deck-1", format));
        }
    }

    #[test]
    fn format_parsing() {
        assert_eq!("PNG".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert_eq!(" pdf ".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert!("jpeg".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn download_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = canned(200, b"\x89PNG fake");
        let file = download(&transport, "deck/1", ExportFormat::Png, dir.path()).unwrap();

        assert_eq!(file.byte_size, 9);
        assert!(file.path.starts_with(dir.path()));
        assert!(file.path.to_string_lossy().ends_with("deck_1.png"));
        assert_eq!(std::fs::read(&file.path).unwrap(), b"\x89PNG fake");
        assert_eq!(transport.seen.borrow()[0], export_url("deck/1", ExportFormat::Png));
    }

    #[test]
    fn unshared_deck_is_export_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        for status in [401, 403, 404] {
            let err = download(&canned(status, b"denied"), "d", ExportFormat::Svg, dir.path()).unwrap_err();
            assert!(matches!(err, Error::ExportUnavailable { status: s, .. } if s == status));
        }
        // nothing written for refused exports
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn server_error_and_empty_body_are_transport_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = download(&canned(500, b"oops"), "d", ExportFormat::Pdf, dir.path()).unwrap_err();
        assert!(matches!(err, Error::TransportError(_)));
        let err = download(&canned(200, b""), "d", ExportFormat::Pdf, dir.path()).unwrap_err();
        assert!(matches!(err, Error::TransportError(_)));
    }

    #[test]
    fn thumbnail_saved_with_role_and_sniffed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let transport = canned(200, b"\x89PNG\r\n\x1a\nthumb");
        let thumb = download_thumbnail(&transport, "https://lh3.example/thumb-b", "before", dir.path()).unwrap();

        assert_eq!(thumb.url, "https://lh3.example/thumb-b");
        assert_eq!(thumb.byte_size, 13);
        assert!(thumb.path.to_string_lossy().ends_with("_before_thumbnail.png"));
        assert_eq!(transport.seen.borrow()[0], "https://lh3.example/thumb-b");

        let thumb = download_thumbnail(&canned(200, b"\xff\xd8\xffjpeg"), "https://t", "after", dir.path()).unwrap();
        assert!(thumb.path.to_string_lossy().ends_with("_after_thumbnail.jpg"));
    }

    #[test]
    fn refused_thumbnail_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let err = download_thumbnail(&canned(403, b""), "https://t", "after", dir.path()).unwrap_err();
        assert!(matches!(err, Error::ExportUnavailable { status: 403, .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn download_all_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let transport = canned(404, b"");
        let results = download_all(&transport, "d", &ExportFormat::ALL, dir.path());
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(_, r)| r.is_err()));
        assert_eq!(transport.seen.borrow().len(), 3);
    }
}
