//! Search-response JSON to `NewsItem`s, one per (article, contributor) pair.
use chrono::NaiveDateTime;
use serde_json::Value;
use thiserror::Error;

use super::types::NewsItem;

/// Timestamp layout of `webPublicationDate` once the trailing `Z` is cut.
const PUBLICATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Display layout: date line, newline, 12-hour time line.
const DISPLAY_FORMAT: &str = "%b %-d %Y\n%-I:%M %p";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing or invalid `{0}` in response envelope")]
    Envelope(&'static str),
    #[error("Missing or invalid `{field}` in result {index}")]
    Field { field: &'static str, index: usize },
}

/// Records recovered from a response, plus the error that stopped parsing.
///
/// A failure on any result aborts the rest of the response, so `items` holds
/// everything accumulated before that point.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub items: Vec<NewsItem>,
    pub error: Option<ParseError>,
}

/// Decode a search response into news items, never failing.
///
/// Empty input, malformed JSON, or an unexpected shape all degrade to an
/// empty (or partial) list; the cause is logged.
pub fn parse_news(json: &str) -> Vec<NewsItem> {
    let ParseOutcome { items, error } = parse_response(json);
    if let Some(e) = error {
        tracing::warn!(error = %e, recovered = items.len(), "Problem parsing the news JSON results");
    }
    items
}

pub fn parse_response(json: &str) -> ParseOutcome {
    if json.trim().is_empty() {
        tracing::debug!("Empty response body, no items");
        return ParseOutcome::default();
    }

    let mut items = Vec::new();
    let error = extract_items(json, &mut items).err();
    ParseOutcome { items, error }
}

fn extract_items(json: &str, items: &mut Vec<NewsItem>) -> Result<(), ParseError> {
    let root: Value = serde_json::from_str(json)?;

    let results = root
        .get("response")
        .filter(|v| v.is_object())
        .ok_or(ParseError::Envelope("response"))?
        .get("results")
        .and_then(Value::as_array)
        .ok_or(ParseError::Envelope("results"))?;

    for (index, result) in results.iter().enumerate() {
        let field = |name: &'static str| {
            str_field(result, name).ok_or(ParseError::Field { field: name, index })
        };

        let title = strip_byline(field("webTitle")?);
        let section = field("sectionName")?;
        let date = format_publication_date(field("webPublicationDate")?);
        let link = field("webUrl")?;

        let tags = result
            .get("tags")
            .and_then(Value::as_array)
            .ok_or(ParseError::Field { field: "tags", index })?;

        // One item per contributor; an article without tags yields nothing.
        for tag in tags {
            let author = str_field(tag, "webTitle").ok_or(ParseError::Field {
                field: "tags.webTitle",
                index,
            })?;
            items.push(NewsItem::new(section, title, author, date.as_str(), link));
        }
    }

    Ok(())
}

fn str_field<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value.get(name).and_then(Value::as_str)
}

/// Cut the title at the first `|`, also dropping the character just before
/// it (the space that separates the headline from the byline).
fn strip_byline(title: &str) -> &str {
    match title.find('|') {
        Some(idx) => {
            let mut head = title[..idx].chars();
            head.next_back();
            head.as_str()
        }
        None => title,
    }
}

/// Reformat `webPublicationDate` for display, or `""` if it does not parse.
fn format_publication_date(raw: &str) -> String {
    let local = raw.find('Z').map_or(raw, |idx| &raw[..idx]);

    match NaiveDateTime::parse_and_remainder(local, PUBLICATION_FORMAT) {
        Ok((timestamp, _)) => timestamp.format(DISPLAY_FORMAT).to_string(),
        Err(e) => {
            tracing::debug!(value = raw, error = %e, "Unparseable publication date");
            String::new()
        }
    }
}
