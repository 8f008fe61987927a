// src/cap/reference.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One `sender,identifier,sent` triple from a CAP `<references>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub sender: String,
    pub identifier: String,
    pub sent: Option<DateTime<Utc>>,
}

impl Reference {
    /// Parse a single token. Needs at least sender and identifier; a missing
    /// or malformed `sent` field is kept as `None`.
    pub fn parse(token: &str) -> Option<Self> {
        let mut fields = token.splitn(3, ',');
        let sender = fields.next()?.trim();
        let identifier = fields.next()?.trim();
        if identifier.is_empty() {
            return None;
        }
        let sent = fields.next().and_then(super::parse_timestamp);
        Some(Self {
            sender: sender.to_string(),
            identifier: identifier.to_string(),
            sent,
        })
    }
}

/// Whitespace-delimited list of triples, order preserved. Malformed tokens are skipped.
pub fn parse_references(raw: &str) -> Vec<Reference> {
    raw.split_whitespace().filter_map(Reference::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn extracts_identifiers_from_each_token() {
        let raw = "sender1,id-A,2024-01-01T00:00:00Z sender1,id-B,2024-01-01T01:00:00Z";
        let refs = parse_references(raw);
        let ids: HashSet<&str> = refs.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, HashSet::from(["id-A", "id-B"]));
        assert_eq!(refs[0].sender, "sender1");
        assert_eq!(
            refs[1].sent,
            crate::cap::parse_timestamp("2024-01-01T01:00:00Z")
        );
    }

    #[test]
    fn tolerates_newlines_and_skips_garbage() {
        let raw = "\n  a@x,1,2024-01-01T00:00:00-00:00\n\tjunk  b@x,2,not-a-date ";
        let refs = parse_references(raw);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].identifier, "1");
        assert_eq!(refs[1].identifier, "2");
        assert!(refs[1].sent.is_none());
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse_references("").is_empty());
        assert!(parse_references("   ").is_empty());
    }
}
