// src/ingest/lifecycle.rs
//! Update/Cancel supersession within a single feed snapshot.
//!
//! Matching is by identifier alone: the sender and sent fields of a reference
//! are not compared, so two senders reusing an identifier would collide.
//! Cancel messages stay in the output when they pass the relevance gate
//! themselves and are not referenced by anything later.

use std::collections::HashSet;

use crate::cap::{Alert, MsgType};

/// Identifiers named by Update and Cancel messages in one snapshot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Superseded {
    pub updated: HashSet<String>,
    pub canceled: HashSet<String>,
}

impl Superseded {
    pub fn collect(alerts: &[Alert]) -> Self {
        let mut out = Self::default();
        for a in alerts {
            let target = match a.msg_type {
                MsgType::Update => &mut out.updated,
                MsgType::Cancel => &mut out.canceled,
                _ => continue,
            };
            target.extend(a.referenced_identifiers().map(str::to_string));
        }
        out
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.updated.contains(identifier) || self.canceled.contains(identifier)
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.canceled.is_empty()
    }
}

/// Stage 5: drop every alert whose identifier an Update or Cancel references.
/// Returns (active, superseded_count).
pub fn resolve_lifecycle(alerts: Vec<Alert>) -> (Vec<Alert>, usize) {
    let superseded = Superseded::collect(&alerts);
    if superseded.is_empty() {
        return (alerts, 0);
    }

    let before = alerts.len();
    let active: Vec<Alert> = alerts
        .into_iter()
        .filter(|a| {
            let gone = superseded.contains(&a.identifier);
            if gone {
                tracing::debug!(
                    target: "ingest",
                    identifier = %a.identifier,
                    msg_type = %a.msg_type,
                    "alert superseded"
                );
            }
            !gone
        })
        .collect();
    let removed = before - active.len();
    (active, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::relevance::tests::{alert, referencing};

    fn ids(v: &[Alert]) -> Vec<&str> {
        v.iter().map(|a| a.identifier.as_str()).collect()
    }

    #[test]
    fn update_replaces_original() {
        let (out, n) = resolve_lifecycle(vec![
            alert("1"),
            referencing("2", MsgType::Update, &["1"]),
        ]);
        assert_eq!(ids(&out), vec!["2"]);
        assert_eq!(n, 1);
    }

    #[test]
    fn chained_updates_keep_only_latest() {
        let (out, n) = resolve_lifecycle(vec![
            referencing("3", MsgType::Update, &["1", "2"]),
            alert("1"),
            referencing("2", MsgType::Update, &["1"]),
        ]);
        assert_eq!(ids(&out), vec!["3"]);
        assert_eq!(n, 2);
    }

    #[test]
    fn cancel_removes_target_and_survives_itself() {
        let (out, _) = resolve_lifecycle(vec![
            alert("1"),
            alert("9"),
            referencing("c", MsgType::Cancel, &["1"]),
        ]);
        assert_eq!(ids(&out), vec!["9", "c"]);
    }

    #[test]
    fn reference_to_absent_alert_is_harmless() {
        let (out, n) = resolve_lifecycle(vec![referencing("2", MsgType::Update, &["gone"])]);
        assert_eq!(ids(&out), vec!["2"]);
        assert_eq!(n, 0);
    }

    #[test]
    fn references_on_plain_alerts_do_not_supersede() {
        let (out, n) = resolve_lifecycle(vec![
            alert("1"),
            referencing("2", MsgType::Alert, &["1"]),
        ]);
        assert_eq!(ids(&out), vec!["1", "2"]);
        assert_eq!(n, 0);
    }

    #[test]
    fn identifier_only_matching_ignores_sender() {
        let mut other_sender = alert("shared");
        other_sender.sender = "someone-else@example.test".into();
        let (out, _) = resolve_lifecycle(vec![
            other_sender,
            referencing("u", MsgType::Update, &["shared"]),
        ]);
        assert_eq!(ids(&out), vec!["u"]);
    }

    #[test]
    fn collect_partitions_by_msg_type() {
        let s = Superseded::collect(&[
            referencing("u", MsgType::Update, &["a", "b"]),
            referencing("c", MsgType::Cancel, &["b", "z"]),
        ]);
        assert_eq!(s.updated, HashSet::from(["a".to_string(), "b".to_string()]));
        assert_eq!(s.canceled, HashSet::from(["b".to_string(), "z".to_string()]));
        assert!(s.contains("z"));
        assert!(!s.contains("u"));
    }

    #[test]
    fn never_grows() {
        let input = vec![alert("1"), alert("2"), referencing("3", MsgType::Update, &["2"])];
        let n = input.len();
        let (out, _) = resolve_lifecycle(input);
        assert!(out.len() <= n);
    }
}
