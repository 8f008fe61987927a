// src/cap/parse.rs
//! CAP 1.2 document → [`Alert`]. Anything that does not yield a complete alert
//! header plus at least one `<info>` block is dropped, never reported as an error.

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use quick_xml::de::from_str;
use serde::Deserialize;

use super::{
    geometry::Geocode, parse_references, parse_timestamp, Alert, Area, Category, Certainty,
    Circle, Info, MsgType, Parameter, Polygon, Scope, Severity, Status, Urgency,
};
use crate::ingest::types::RawDocument;
use crate::ingest::{normalize_text, scrub_html_entities_for_xml};

#[derive(Debug, Deserialize)]
struct RawAlert {
    identifier: Option<String>,
    sender: Option<String>,
    sent: Option<String>,
    status: Option<String>,
    #[serde(rename = "msgType")]
    msg_type: Option<String>,
    scope: Option<String>,
    references: Option<String>,
    #[serde(default)]
    info: Vec<RawInfo>,
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    language: Option<String>,
    #[serde(default)]
    category: Vec<String>,
    event: Option<String>,
    urgency: Option<String>,
    severity: Option<String>,
    certainty: Option<String>,
    effective: Option<String>,
    onset: Option<String>,
    expires: Option<String>,
    #[serde(rename = "senderName")]
    sender_name: Option<String>,
    headline: Option<String>,
    description: Option<String>,
    instruction: Option<String>,
    web: Option<String>,
    #[serde(default)]
    parameter: Vec<RawNamedValue>,
    #[serde(default)]
    area: Vec<RawArea>,
}

#[derive(Debug, Deserialize)]
struct RawNamedValue {
    #[serde(rename = "valueName")]
    value_name: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawArea {
    #[serde(rename = "areaDesc")]
    area_desc: Option<String>,
    #[serde(default)]
    polygon: Vec<String>,
    #[serde(default)]
    circle: Vec<String>,
    #[serde(default)]
    geocode: Vec<RawNamedValue>,
}

/// Parse one document, or `None` when it does not describe a usable alert.
pub fn parse_document(doc: &RawDocument, preferred_language: Option<&str>) -> Option<Alert> {
    match try_parse(doc, preferred_language) {
        Ok(alert) => Some(alert),
        Err(e) => {
            tracing::debug!(
                target: "ingest",
                reference = %doc.reference,
                error = ?e,
                "dropping unusable CAP document"
            );
            counter!("cap_parse_dropped_total").increment(1);
            None
        }
    }
}

/// Stage 3: parse every document, silently dropping the unusable ones.
pub fn parse_documents(docs: &[RawDocument], preferred_language: Option<&str>) -> Vec<Alert> {
    docs.iter()
        .filter_map(|d| parse_document(d, preferred_language))
        .collect()
}

fn try_parse(doc: &RawDocument, preferred_language: Option<&str>) -> Result<Alert> {
    let xml_clean = scrub_html_entities_for_xml(&doc.body);
    let raw: RawAlert = from_str(&xml_clean).context("parsing cap xml")?;

    let identifier = required_text(raw.identifier, "identifier")?;
    let sender = required_text(raw.sender, "sender")?;
    let sent = required_text(raw.sent, "sent")?;
    let sent = parse_timestamp(&sent).ok_or_else(|| anyhow!("bad sent timestamp {sent:?}"))?;
    let status: Status = required_text(raw.status, "status")?.parse()?;
    let msg_type: MsgType = required_text(raw.msg_type, "msgType")?.parse()?;
    let scope: Scope = required_text(raw.scope, "scope")?.parse()?;
    let references = raw
        .references
        .as_deref()
        .map(parse_references)
        .unwrap_or_default();

    let info =
        select_info(raw.info, preferred_language).ok_or_else(|| anyhow!("no <info> block"))?;

    Ok(Alert {
        identifier,
        sender,
        sent,
        status,
        msg_type,
        scope,
        references,
        info: convert_info(info),
        source: doc.reference.clone(),
    })
}

fn required_text(v: Option<String>, field: &str) -> Result<String> {
    v.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("missing <{field}>"))
}

/// Prefer the block whose language starts with `preferred` (so `en` matches `en-US`),
/// else the first block.
fn select_info(mut infos: Vec<RawInfo>, preferred: Option<&str>) -> Option<RawInfo> {
    if infos.is_empty() {
        return None;
    }
    let idx = preferred
        .map(|p| p.to_ascii_lowercase())
        .and_then(|p| {
            infos.iter().position(|i| {
                i.language
                    .as_deref()
                    .is_some_and(|l| l.trim().to_ascii_lowercase().starts_with(&p))
            })
        })
        .unwrap_or(0);
    Some(infos.swap_remove(idx))
}

fn convert_info(raw: RawInfo) -> Info {
    Info {
        language: optional_text(raw.language),
        categories: raw
            .category
            .iter()
            .filter_map(|c| c.parse::<Category>().ok())
            .collect(),
        event: raw.event.map(|e| normalize_text(&e)).unwrap_or_default(),
        urgency: lenient(raw.urgency, Urgency::Unknown),
        severity: lenient(raw.severity, Severity::Unknown),
        certainty: lenient(raw.certainty, Certainty::Unknown),
        effective: raw.effective.as_deref().and_then(parse_timestamp),
        onset: raw.onset.as_deref().and_then(parse_timestamp),
        expires: raw.expires.as_deref().and_then(parse_timestamp),
        sender_name: normalized(raw.sender_name),
        headline: normalized(raw.headline),
        description: normalized(raw.description),
        instruction: normalized(raw.instruction),
        web: optional_text(raw.web),
        parameters: raw
            .parameter
            .into_iter()
            .filter_map(|p| {
                Some(Parameter {
                    name: optional_text(p.value_name)?,
                    value: p.value.unwrap_or_default().trim().to_string(),
                })
            })
            .collect(),
        areas: raw.area.into_iter().map(convert_area).collect(),
    }
}

fn convert_area(raw: RawArea) -> Area {
    Area {
        description: raw.area_desc.map(|d| normalize_text(&d)).unwrap_or_default(),
        polygons: raw.polygon.iter().filter_map(|p| Polygon::parse(p)).collect(),
        circles: raw.circle.iter().filter_map(|c| Circle::parse(c)).collect(),
        geocodes: raw
            .geocode
            .into_iter()
            .filter_map(|g| {
                Some(Geocode {
                    name: optional_text(g.value_name)?,
                    value: g.value.unwrap_or_default().trim().to_string(),
                })
            })
            .collect(),
    }
}

fn lenient<T: std::str::FromStr + Copy>(v: Option<String>, fallback: T) -> T {
    v.as_deref()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(fallback)
}

fn optional_text(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn normalized(v: Option<String>) -> Option<String> {
    v.map(|s| normalize_text(&s)).filter(|s| !s.is_empty())
}
