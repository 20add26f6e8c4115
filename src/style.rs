//! Style extraction from free-form prompt text
//!
//! A prompt may name a heading/body font pair ("Merriweather/Inter fonts") and
//! link a palette from a palette service
//! (`https://coolors.co/edd3c4-c8adc0-7765e3-3b60e4-080708`). Both are
//! recovered independently. Extraction is total: anything that is not
//! recognized is reported as absent, never as an error or a placeholder.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

/// Base URL used when a palette has to be rendered back into a prompt
pub const PALETTE_BASE_URL: &str = "https://coolors.co";

/// Maximum number of colours a palette URL may carry
pub const MAX_PALETTE_LEN: usize = 5;

/// Prompt used for the baseline deck when nothing is left after stripping style terms
pub const DEFAULT_BASELINE_PROMPT: &str = "Create presentation with default fonts";

// Words that introduce a font phrase rather than belong to a family name.
const CONNECTORS: &[&str] = &["and", "with", "using", "use", "in", "featuring", "plus"];

fn font_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?P<heading>[A-Z][\w-]*(?:[ \t]+[A-Z0-9][\w-]*)*)[ \t]*/[ \t]*(?P<body>[A-Z][\w-]*(?:[ \t]+[A-Z0-9][\w-]*)*)\s+(?i:fonts)\b",
        )
        .expect("font pair pattern is valid")
    })
}

fn palette_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bhttps?://(?:www\.)?coolors\.co/(?:palette/)?(?P<codes>[^\s/?#]+)")
            .expect("palette url pattern is valid")
    })
}

/// A (heading, body) typeface combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontPair {
    pub heading: String,
    pub body: String,
}

impl FontPair {
    /// Build a pair from trimmed family names; `None` if either side is empty.
    pub fn new(heading: impl AsRef<str>, body: impl AsRef<str>) -> Option<Self> {
        let heading = heading.as_ref().trim();
        let body = body.as_ref().trim();
        if heading.is_empty() || body.is_empty() {
            return None;
        }
        Some(Self {
            heading: heading.to_string(),
            body: body.to_string(),
        })
    }
}

impl fmt::Display for FontPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.heading, self.body)
    }
}

/// An ordered palette of 6-digit hex colours
///
/// Order is kept exactly as it appeared in the source URL. By convention the
/// first entry is a light/background tone and the last the darkest, but no
/// reordering happens here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorPalette {
    pub source_url: String,
    pub hex_codes: Vec<String>,
}

impl ColorPalette {
    /// Validate and wrap a list of codes. All-or-nothing: one bad code, an
    /// empty list or more than [`MAX_PALETTE_LEN`] codes yields `None`.
    pub fn new<I, S>(source_url: impl Into<String>, codes: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hex_codes = Vec::new();
        for code in codes {
            let code = code.as_ref();
            if !is_hex6(code) {
                return None;
            }
            hex_codes.push(code.to_string());
        }
        if hex_codes.is_empty() || hex_codes.len() > MAX_PALETTE_LEN {
            return None;
        }
        Some(Self {
            source_url: source_url.into(),
            hex_codes,
        })
    }

    /// Build a palette from bare codes, synthesizing a palette-service URL.
    /// A leading `#` on each code is tolerated.
    pub fn from_hex_codes<I, S>(codes: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes: Vec<String> = codes
            .into_iter()
            .map(|c| c.as_ref().trim().trim_start_matches('#').to_string())
            .collect();
        let url = format!("{}/{}", PALETTE_BASE_URL, codes.join("-"));
        Self::new(url, codes)
    }
}

/// Returns true for exactly six ASCII hex digits
pub fn is_hex6(token: &str) -> bool {
    token.len() == 6 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Style recovered from a prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSpec {
    pub font_pair: Option<FontPair>,
    pub color_palette: Option<ColorPalette>,
}

impl StyleSpec {
    pub fn is_empty(&self) -> bool {
        self.font_pair.is_none() && self.color_palette.is_none()
    }

    /// Natural-language suffix that asks the creation service for this style,
    /// phrased so that [`extract`] recovers the same style from it.
    pub fn describe(&self) -> Option<String> {
        match (&self.font_pair, &self.color_palette) {
            (Some(fonts), Some(palette)) => Some(format!(
                "with {} and {} fonts",
                palette.source_url, fonts
            )),
            (Some(fonts), None) => Some(format!("with {} fonts", fonts)),
            (None, Some(palette)) => Some(format!("with {} palette", palette.source_url)),
            (None, None) => None,
        }
    }
}

/// Extract both the font pair and the palette from `prompt`.
pub fn extract(prompt: &str) -> StyleSpec {
    StyleSpec {
        font_pair: extract_font_pair(prompt),
        color_palette: extract_palette(prompt),
    }
}

/// First "Heading/Body fonts" phrase in reading order, if any.
pub fn extract_font_pair(prompt: &str) -> Option<FontPair> {
    let caps = font_pair_re().captures(prompt)?;
    let heading = drop_connector_prefix(caps.name("heading")?.as_str());
    FontPair::new(heading, caps.name("body")?.as_str())
}

/// First palette-service URL whose codes all validate, if any.
pub fn extract_palette(prompt: &str) -> Option<ColorPalette> {
    palette_url_re().captures_iter(prompt).find_map(|caps| {
        let whole = caps.get(0)?;
        let codes = caps.name("codes")?;
        let trimmed = trim_trailing_punctuation(codes.as_str());
        let url_end = codes.start() + trimmed.len();
        let url = &prompt[whole.start()..url_end];
        ColorPalette::new(url, trimmed.split('-'))
    })
}

/// Remove the recognized font phrase and every palette URL from `prompt`,
/// together with the connector word that introduced each one.
///
/// Used to derive the unstyled baseline prompt for a comparison.
pub fn strip_style_terms(prompt: &str) -> String {
    let mut spans: Vec<Range<usize>> = Vec::new();
    if let Some(m) = font_pair_re().captures(prompt) {
        let whole = m.get(0).map(|g| g.range());
        let heading = m.name("heading").map(|g| g.as_str());
        if let (Some(range), Some(heading)) = (whole, heading) {
            // keep leading connectors so they are dropped with the phrase below
            let kept = heading.len() - drop_connector_prefix(heading).len();
            spans.push(range.start + kept..range.end);
        }
    }
    for caps in palette_url_re().captures_iter(prompt) {
        if let (Some(whole), Some(codes)) = (caps.get(0), caps.name("codes")) {
            let trimmed = trim_trailing_punctuation(codes.as_str());
            spans.push(whole.start()..codes.start() + trimmed.len());
        }
    }
    spans.sort_by_key(|r| r.start);

    const MARK: &str = "\u{0}";
    let mut marked = String::with_capacity(prompt.len());
    let mut cursor = 0;
    for span in spans {
        if span.start < cursor {
            continue;
        }
        marked.push_str(&prompt[cursor..span.start]);
        marked.push(' ');
        marked.push_str(MARK);
        marked.push(' ');
        cursor = span.end;
    }
    marked.push_str(&prompt[cursor..]);

    let mut words: Vec<&str> = Vec::new();
    for word in marked.split_whitespace() {
        if word == MARK {
            while words
                .last()
                .is_some_and(|w| CONNECTORS.contains(&w.to_ascii_lowercase().as_str()))
            {
                words.pop();
            }
        } else {
            words.push(word);
        }
    }

    let stripped = words.join(" ");
    let stripped = stripped.trim_end_matches([' ', '-', ',', ';', ':']).trim();
    if stripped.is_empty() {
        DEFAULT_BASELINE_PROMPT.to_string()
    } else {
        stripped.to_string()
    }
}

// Everything up to and including the last connector word in the run belongs
// to the surrounding sentence, not to the family name.
fn drop_connector_prefix(heading: &str) -> &str {
    let mut start = 0;
    let mut offset = 0;
    for word in heading.split([' ', '\t']) {
        let end = offset + word.len();
        if CONNECTORS.contains(&word.to_ascii_lowercase().as_str()) {
            start = end;
        }
        offset = end + 1;
    }
    heading[start..].trim_start()
}

// Sentence punctuation only; a trailing `-` is an empty code and must fail validation.
fn trim_trailing_punctuation(s: &str) -> &str {
    s.trim_end_matches(['.', ',', ';', ':', '!', ')', '"', '\''])
}
