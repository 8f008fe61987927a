// src/ingest/relevance.rs
//! Relevance gate: keeps actual, public, meteorological alerts that are still
//! actionable at the caller-supplied `now`.

use chrono::{DateTime, Utc};

use crate::cap::{Alert, Category, MsgType, Scope, Status, Urgency};

/// A single relevance condition an alert can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotActual,
    NotPublic,
    NotMeteorological,
    AckOrError,
    NotActionable,
    NoGeometry,
    Expired,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::NotActual => "status",
            Rejection::NotPublic => "scope",
            Rejection::NotMeteorological => "category",
            Rejection::AckOrError => "msg_type",
            Rejection::NotActionable => "urgency",
            Rejection::NoGeometry => "area",
            Rejection::Expired => "expired",
        }
    }
}

/// Evaluate every condition against `alert`; empty means relevant.
pub fn rejections(alert: &Alert, now: DateTime<Utc>) -> Vec<Rejection> {
    let checks = [
        (alert.status == Status::Actual, Rejection::NotActual),
        (alert.scope == Scope::Public, Rejection::NotPublic),
        (alert.info.has_category(Category::Met), Rejection::NotMeteorological),
        (
            !matches!(alert.msg_type, MsgType::Ack | MsgType::Error),
            Rejection::AckOrError,
        ),
        (
            matches!(
                alert.info.urgency,
                Urgency::Immediate | Urgency::Expected | Urgency::Future
            ),
            Rejection::NotActionable,
        ),
        (alert.info.has_geometry(), Rejection::NoGeometry),
        (!alert.is_expired(now), Rejection::Expired),
    ];
    checks
        .into_iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, r)| r)
        .collect()
}

pub fn is_relevant(alert: &Alert, now: DateTime<Utc>) -> bool {
    rejections(alert, now).is_empty()
}

/// Stage 4: relevant subsequence, original order preserved.
pub fn filter_relevant(alerts: Vec<Alert>, now: DateTime<Utc>) -> Vec<Alert> {
    alerts
        .into_iter()
        .filter(|a| {
            let failed = rejections(a, now);
            if !failed.is_empty() {
                tracing::trace!(
                    target: "ingest",
                    identifier = %a.identifier,
                    failed = ?failed.iter().map(Rejection::as_str).collect::<Vec<_>>(),
                    "alert not relevant"
                );
            }
            failed.is_empty()
        })
        .collect()
}
