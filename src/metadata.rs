//! Title and date of a thesaurus, read once from its source document.
//!
//! The title is the `dc:title` of the `skos:ConceptScheme` below the document
//! root, the date its `dcterms:issued` or, failing that, `dcterms:modified`.
//! Nothing here is fatal: whatever cannot be recovered is logged and left
//! unset, and the title falls back to a default.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::vocab::{dc, dcterms, skos};

/// Date patterns tried in order, the first one that parses wins.
const VERBOSE_FORMAT: &str = "%b %d %H:%M:%S %Z %Y";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThesaurusInfo {
    title: String,
    date: Option<NaiveDate>,
}

impl ThesaurusInfo {
    pub fn retrieve(path: &Path, default_title: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(document) => Self::from_document(&document, default_title),
            Err(e) => {
                info!(path = %path.display(), error = %e, "Error getting thesaurus info");
                Self::untitled(default_title)
            }
        }
    }

    pub fn from_document(document: &str, default_title: &str) -> Self {
        let scheme = match scan(document) {
            Ok(scheme) => scheme,
            Err(e) => {
                info!(error = %e, "Error getting thesaurus info");
                return Self::untitled(default_title);
            }
        };
        let date = scheme
            .issued
            .as_deref()
            .and_then(|text| parse_thesaurus_date(text, "dcterms:issued"))
            .or_else(|| {
                scheme
                    .modified
                    .as_deref()
                    .and_then(|text| parse_thesaurus_date(text, "dcterms:modified"))
            });
        Self {
            title: scheme.title.unwrap_or_else(|| default_title.to_string()),
            date,
        }
    }

    fn untitled(default_title: &str) -> Self {
        Self {
            title: default_title.to_string(),
            date: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// Parses a thesaurus date, trying the verbose English form
/// (`Wed Jan 15 10:20:30 CET 2020`), then `2020-01-15 10:20:30`, then
/// `2020-01-15`. The two numeric forms accept trailing text.
pub fn parse_thesaurus_date(text: &str, element: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let parsed = NaiveDateTime::parse_from_str(without_weekday(text), VERBOSE_FORMAT)
        .map(|date_time| date_time.date())
        .or_else(|_| {
            NaiveDateTime::parse_and_remainder(text, DATE_TIME_FORMAT)
                .map(|(date_time, _)| date_time.date())
        })
        .or_else(|_| NaiveDate::parse_and_remainder(text, DATE_FORMAT).map(|(date, _)| date));
    match parsed {
        Ok(date) => {
            debug!(text, %date, "parsed thesaurus date");
            Some(date)
        }
        Err(_) => {
            warn!(text, element, "Error parsing thesaurus date");
            None
        }
    }
}

// The weekday of the verbose pattern is not checked against the date.
fn without_weekday(text: &str) -> &str {
    match text.split_once(char::is_whitespace) {
        Some((weekday, rest)) if weekday.chars().all(|c| c.is_ascii_alphabetic()) => rest.trim_start(),
        _ => text,
    }
}

#[derive(Debug, Default)]
struct SchemeElements {
    title: Option<String>,
    issued: Option<String>,
    modified: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Wanted {
    Title,
    Issued,
    Modified,
}

fn scan(document: &str) -> Result<SchemeElements> {
    let mut reader = NsReader::from_str(document);
    let mut found = SchemeElements::default();
    // depth of the current element, the root being 1
    let mut depth = 0usize;
    let mut in_scheme = false;
    let mut capturing: Option<(Wanted, usize, String)> = None;
    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let namespace = match resolved {
            ResolveResult::Bound(namespace) => {
                String::from_utf8_lossy(namespace.into_inner()).into_owned()
            }
            _ => String::new(),
        };
        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let empty = matches!(event, Event::Empty(_));
                depth += 1;
                let local_name = String::from_utf8_lossy(element.local_name().into_inner()).into_owned();
                if depth == 2 && namespace == skos::NS && local_name == skos::CONCEPT_SCHEME {
                    in_scheme = !empty;
                } else if depth == 3 && in_scheme && capturing.is_none() {
                    let wanted = match (namespace.as_str(), local_name.as_str()) {
                        (dc::NS, dc::TITLE) if found.title.is_none() => Some(Wanted::Title),
                        (dcterms::NS, dcterms::ISSUED) if found.issued.is_none() => {
                            Some(Wanted::Issued)
                        }
                        (dcterms::NS, dcterms::MODIFIED) if found.modified.is_none() => {
                            Some(Wanted::Modified)
                        }
                        _ => None,
                    };
                    if let Some(wanted) = wanted {
                        if empty {
                            store(&mut found, wanted, String::new());
                        } else {
                            capturing = Some((wanted, depth, String::new()));
                        }
                    }
                }
                if empty {
                    depth -= 1;
                }
            }
            Event::Text(ref text) => {
                if let Some((_, _, value)) = capturing.as_mut() {
                    value.push_str(&text.unescape()?);
                }
            }
            Event::CData(ref data) => {
                if let Some((_, _, value)) = capturing.as_mut() {
                    value.push_str(&String::from_utf8_lossy(data));
                }
            }
            Event::End(_) => {
                if let Some((wanted, at, _)) = &capturing {
                    if *at == depth {
                        let wanted = *wanted;
                        if let Some((_, _, value)) = capturing.take() {
                            store(&mut found, wanted, value);
                        }
                    }
                }
                if depth == 2 {
                    in_scheme = false;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => (),
        }
    }
    Ok(found)
}

fn store(found: &mut SchemeElements, wanted: Wanted, value: String) {
    let value = value.trim().to_string();
    match wanted {
        Wanted::Title => found.title = Some(value),
        Wanted::Issued => found.issued = Some(value),
        Wanted::Modified => found.modified = Some(value),
    }
}
