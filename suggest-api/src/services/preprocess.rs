//! Inbound content normalization
//!
//! Providers expect plain text. Byline and headline get entity decoding, tag
//! removal and whitespace cleanup; the body additionally loses embedded
//! elements (pull quotes, tables, promo boxes, inline pictures) together with
//! their content, since that text is not part of the article itself.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Body elements removed together with everything inside them
const EMBEDDED_ELEMENTS: [&str; 5] = [
    "pull-quote",
    "web-pull-quote",
    "table",
    "promo-box",
    "web-inline-picture",
];

static EMBEDDED: Lazy<Vec<Regex>> = Lazy::new(|| {
    EMBEDDED_ELEMENTS
        .iter()
        .map(|name| {
            let pattern = format!(r"(?is)<{name}\b[^>]*/>|<{name}\b[^>]*>.*?</{name}\s*>");
            Regex::new(&pattern).expect("embedded element pattern is valid")
        })
        .collect()
});

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});")
        .expect("entity pattern is valid")
});

/// Content fields providers understand
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContentPayload {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub byline: String,
    #[serde(rename = "bodyXML", default)]
    pub body: String,
    #[serde(rename = "title", default, skip_serializing_if = "String::is_empty")]
    pub headline: String,
}

/// Parse the raw request body, normalize each field and re-serialize
pub fn prepare_payload(raw: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let mut payload: ContentPayload = serde_json::from_slice(raw)?;

    payload.byline = normalize_text(&payload.byline);
    payload.body = normalize_body(&payload.body);
    payload.headline = normalize_text(&payload.headline);

    serde_json::to_vec(&payload)
}

/// Entity decoding, tag removal, trimming, whitespace collapsing
pub fn normalize_text(text: &str) -> String {
    let decoded = decode_entities(text);
    let stripped = TAG.replace_all(&decoded, " ");
    collapse_whitespace(&stripped)
}

/// Drop embedded elements, then apply [`normalize_text`]
pub fn normalize_body(body: &str) -> String {
    let mut cleaned = body.to_string();
    for element in EMBEDDED.iter() {
        cleaned = element.replace_all(&cleaned, " ").into_owned();
    }
    normalize_text(&cleaned)
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Decode named and numeric character references; unknown ones are kept verbatim
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            match decode_entity(entity) {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(numeric) = entity.strip_prefix('#') {
        let hex = numeric
            .strip_prefix('x')
            .or_else(|| numeric.strip_prefix('X'));
        let code = match hex {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }

    let c = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "hellip" => '\u{2026}',
        "pound" => '\u{a3}',
        "euro" => '\u{20ac}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "eacute" => '\u{e9}',
        "egrave" => '\u{e8}',
        "uuml" => '\u{fc}',
        "ouml" => '\u{f6}',
        "auml" => '\u{e4}',
        _ => return None,
    };
    Some(c)
}
