//! Typed client for the remote deck creation service
//!
//! The service speaks a `{fn, args}` JSON envelope over POST and answers with
//! `{result: {...}}`. Calls are modelled as a closed set of [`RemoteCall`]
//! variants and every answer is folded into an [`ArtifactResult`]; transport
//! and remote failures never escape this module as errors.

use crate::export::{self, ExportFormat};
use crate::style::{self, ColorPalette, FontPair, StyleSpec};
use crate::{Config, Error, Result};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

/// Error recorded when the endpoint could not be reached at all
pub const UNREACHABLE: &str = "transport:unreachable";
/// Error recorded when a 2xx body could not be decoded
pub const MALFORMED: &str = "transport:malformed";
/// Error recorded when the service reports failure without a reason
pub const REMOTE_UNSPECIFIED: &str = "remote:unspecified";

/// Raw HTTP answer handed back by a [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Blocking HTTP seam. `Err` means nothing came back (refused, DNS, timeout);
/// any HTTP status, including errors, is an `Ok`.
pub trait Transport {
    fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse>;
    fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a blocking `reqwest` client
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::TransportError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn read(response: reqwest::blocking::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| Error::TransportError(format!("Failed to read response body: {}", e)))?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .map_err(|e| Error::TransportError(format!("POST {} failed: {}", url, e)))?;
        Self::read(response)
    }

    fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::TransportError(format!("GET {} failed: {}", url, e)))?;
        Self::read(response)
    }
}

/// Functions the creation service exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `createPresentationFromPrompt(prompt)`
    CreatePresentation { prompt: String },
    /// `createFontComparison()`
    CreateFontComparison,
    /// `testFontParsing(prompt)`
    TestFontParsing { prompt: String },
}

impl RemoteCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            RemoteCall::CreatePresentation { .. } => "createPresentationFromPrompt",
            RemoteCall::CreateFontComparison => "createFontComparison",
            RemoteCall::TestFontParsing { .. } => "testFontParsing",
        }
    }

    pub fn to_request(&self) -> ArtifactRequest {
        let args = match self {
            RemoteCall::CreatePresentation { prompt } | RemoteCall::TestFontParsing { prompt } => {
                vec![prompt.clone()]
            }
            RemoteCall::CreateFontComparison => Vec::new(),
        };
        ArtifactRequest {
            function_name: self.function_name().to_string(),
            args,
        }
    }
}

/// Wire envelope; the only shape ever sent to the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRequest {
    #[serde(rename = "fn")]
    pub function_name: String,
    pub args: Vec<String>,
}

/// Outcome of one creation call
///
/// `artifact_id` is present iff `success`; `error` is present iff not.
/// Build values through [`ArtifactResult::created`] or
/// [`ArtifactResult::failure`] to keep that pairing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResult {
    pub success: bool,
    pub artifact_id: Option<String>,
    pub edit_url: Option<String>,
    pub public_url: Option<String>,
    pub export_url_by_format: BTreeMap<ExportFormat, String>,
    pub thumbnail_url: Option<String>,
    pub font_pair: Option<FontPair>,
    pub color_palette: Option<ColorPalette>,
    pub error: Option<String>,
}

impl ArtifactResult {
    /// A created deck. `edit_url` falls back to the edit URL template.
    pub fn created(artifact_id: impl Into<String>, edit_url: Option<String>, formats: &[ExportFormat]) -> Self {
        let artifact_id = artifact_id.into();
        let export_url_by_format = formats
            .iter()
            .map(|&f| (f, export::export_url(&artifact_id, f)))
            .collect();
        Self {
            success: true,
            edit_url: Some(edit_url.unwrap_or_else(|| export::edit_url(&artifact_id))),
            public_url: Some(export::public_url(&artifact_id)),
            export_url_by_format,
            thumbnail_url: None,
            font_pair: None,
            color_palette: None,
            error: None,
            artifact_id: Some(artifact_id),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            artifact_id: None,
            edit_url: None,
            public_url: None,
            export_url_by_format: BTreeMap::new(),
            thumbnail_url: None,
            font_pair: None,
            color_palette: None,
            error: Some(error.into()),
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.error.as_deref() == Some(UNREACHABLE)
    }
}

/// Baseline and styled results of one comparison, in request order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonPair {
    pub before: ArtifactResult,
    pub after: ArtifactResult,
}

/// What the service's own parser made of a prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteParse {
    pub success: bool,
    pub font_pair: Option<FontPair>,
    pub color_palette: Option<ColorPalette>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    result: Option<RemoteResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteResult {
    success: Option<bool>,
    presentation_id: Option<String>,
    edit_url: Option<String>,
    presentation_url: Option<String>,
    thumbnail_link: Option<String>,
    font_pair: Option<Value>,
    color_palette: Option<Value>,
    error: Option<Value>,
    before: Option<Box<RemoteResult>>,
    after: Option<Box<RemoteResult>>,
}

/// Client for the creation service
///
/// Sends exactly one request per call and never retries; retry policy is the
/// caller's business.
pub struct ArtifactClient<T: Transport = HttpTransport> {
    transport: T,
    endpoint: String,
    export_formats: Vec<ExportFormat>,
    pacing: Duration,
}

impl ArtifactClient<HttpTransport> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_millis(config.request_timeout_ms))?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> ArtifactClient<T> {
    pub fn with_transport(transport: T, config: &Config) -> Self {
        Self {
            transport,
            endpoint: config.endpoint_url.clone(),
            export_formats: config.export_formats.clone(),
            pacing: Duration::from_millis(config.pacing_ms),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `createPresentationFromPrompt(prompt)`
    pub fn create(&self, prompt: &str) -> ArtifactResult {
        self.send(&RemoteCall::CreatePresentation {
            prompt: prompt.to_string(),
        })
    }

    /// Issue any call and decode its answer as a single deck.
    pub fn send(&self, call: &RemoteCall) -> ArtifactResult {
        match self.exchange(call) {
            Ok(result) => self.decode_artifact(&result),
            Err(failure) => ArtifactResult::failure(failure),
        }
    }

    /// Create the baseline deck, wait out the pacing delay, then create the
    /// styled deck. Baseline always goes first.
    ///
    /// Individual failures are reported inside the pair. Only when neither
    /// request reached the endpoint does the whole call fail.
    pub fn create_comparison(&self, prompt: &str, style: &StyleSpec) -> Result<ComparisonPair> {
        let baseline = style::strip_style_terms(prompt);
        let styled = match style.describe() {
            Some(description) => format!("{} {}", baseline, description),
            None => {
                warn!("no font pair or palette in prompt; styled deck will match the baseline");
                prompt.trim().to_string()
            }
        };

        info!("creating baseline deck");
        let before = self.create(&baseline);

        if !self.pacing.is_zero() {
            debug!("pacing {:?} before styled request", self.pacing);
            std::thread::sleep(self.pacing);
        }

        info!("creating styled deck");
        let after = self.create(&styled);

        if before.is_unreachable() && after.is_unreachable() {
            return Err(Error::TransportError(format!(
                "creation service unreachable at {}",
                self.endpoint
            )));
        }
        Ok(ComparisonPair { before, after })
    }

    /// `createFontComparison()`: let the service build both decks itself.
    pub fn create_server_comparison(&self) -> Result<ComparisonPair> {
        let result = match self.exchange(&RemoteCall::CreateFontComparison) {
            Ok(result) => result,
            Err(failure) if failure == UNREACHABLE => {
                return Err(Error::TransportError(format!(
                    "creation service unreachable at {}",
                    self.endpoint
                )));
            }
            Err(failure) => {
                return Ok(ComparisonPair {
                    before: ArtifactResult::failure(failure.clone()),
                    after: ArtifactResult::failure(failure),
                })
            }
        };

        let decode_side = |side: Option<&RemoteResult>| match side {
            Some(side) => self.decode_artifact(side),
            None => ArtifactResult::failure(MALFORMED),
        };
        Ok(ComparisonPair {
            before: decode_side(result.before.as_deref()),
            after: decode_side(result.after.as_deref()),
        })
    }

    /// `testFontParsing(prompt)`: ask the service what style it sees.
    pub fn parse_remotely(&self, prompt: &str) -> RemoteParse {
        match self.exchange(&RemoteCall::TestFontParsing {
            prompt: prompt.to_string(),
        }) {
            Ok(result) => RemoteParse {
                success: true,
                font_pair: result.font_pair.as_ref().and_then(decode_font_pair),
                color_palette: result.color_palette.as_ref().and_then(decode_palette),
                error: None,
            },
            Err(error) => RemoteParse {
                success: false,
                font_pair: None,
                color_palette: None,
                error: Some(error),
            },
        }
    }

    // One round trip. `Err` carries the error string recorded in the result.
    fn exchange(&self, call: &RemoteCall) -> std::result::Result<RemoteResult, String> {
        let request = call.to_request();
        let body = serde_json::to_value(&request).map_err(|_| MALFORMED.to_string())?;
        debug!("POST {} fn={} args={}", self.endpoint, request.function_name, request.args.len());

        let response = match self.transport.post_json(&self.endpoint, &body) {
            Ok(response) => response,
            Err(e) => {
                warn!("{} did not reach the service: {}", request.function_name, e);
                return Err(UNREACHABLE.to_string());
            }
        };

        if !response.is_success() {
            warn!("{} returned HTTP {}", request.function_name, response.status);
            return Err(format!("transport:{}", response.status));
        }

        let envelope: ResponseEnvelope = serde_json::from_slice(&response.body).map_err(|e| {
            warn!("{} returned an undecodable body: {}", request.function_name, e);
            MALFORMED.to_string()
        })?;
        let result = envelope.result.ok_or_else(|| {
            warn!("{} response has no result object", request.function_name);
            MALFORMED.to_string()
        })?;

        if result.success != Some(true) {
            let error = match &result.error {
                Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
                Some(Value::String(_)) | Some(Value::Null) | None => REMOTE_UNSPECIFIED.to_string(),
                Some(other) => other.to_string(),
            };
            warn!("{} reported failure: {}", request.function_name, error);
            return Err(error);
        }

        Ok(result)
    }

    fn decode_artifact(&self, result: &RemoteResult) -> ArtifactResult {
        let Some(id) = result.presentation_id.as_deref().filter(|id| !id.trim().is_empty()) else {
            warn!("service reported success without a presentationId");
            return ArtifactResult::failure(MALFORMED);
        };

        let edit_url = result.edit_url.clone().or_else(|| result.presentation_url.clone());
        let mut artifact = ArtifactResult::created(id, edit_url, &self.export_formats);
        artifact.thumbnail_url = result.thumbnail_link.clone().filter(|t| !t.is_empty());
        artifact.font_pair = result.font_pair.as_ref().and_then(decode_font_pair);
        artifact.color_palette = result.color_palette.as_ref().and_then(decode_palette);
        info!("created deck {}", id);
        artifact
    }
}

fn decode_font_pair(value: &Value) -> Option<FontPair> {
    FontPair::new(value.get("heading")?.as_str()?, value.get("body")?.as_str()?)
}

// Accepts {palette: [...], url?} as the service sends it, or our own
// {hexCodes: [...], sourceUrl?} shape.
fn decode_palette(value: &Value) -> Option<ColorPalette> {
    let codes = value
        .get("palette")
        .or_else(|| value.get("hexCodes"))?
        .as_array()?
        .iter()
        .map(|c| c.as_str().map(|s| s.trim().trim_start_matches('#').to_string()))
        .collect::<Option<Vec<String>>>()?;

    match value
        .get("url")
        .or_else(|| value.get("sourceUrl"))
        .and_then(Value::as_str)
    {
        Some(url) => ColorPalette::new(url, codes),
        None => ColorPalette::from_hex_codes(codes),
    }
}
