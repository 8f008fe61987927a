// src/cap/mod.rs
//! Canonical CAP 1.2 alert model. Values are built once by [`parse`] and never
//! edited afterwards; later stages only include or exclude whole alerts.

pub mod geometry;
pub mod parse;
pub mod reference;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

pub use geometry::{Area, Circle, GeoPoint, Geocode, Polygon};
pub use reference::{parse_references, Reference};

/// Implements `FromStr` (exact CAP token match) and `as_str` for a unit enum.
macro_rules! cap_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownToken;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownToken {
                        field: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {field} value {value:?}")]
pub struct UnknownToken {
    pub field: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Actual,
    Exercise,
    System,
    Test,
    Draft,
}
cap_enum!(Status {
    Actual => "Actual",
    Exercise => "Exercise",
    System => "System",
    Test => "Test",
    Draft => "Draft",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MsgType {
    Alert,
    Update,
    Cancel,
    Ack,
    Error,
}
cap_enum!(MsgType {
    Alert => "Alert",
    Update => "Update",
    Cancel => "Cancel",
    Ack => "Ack",
    Error => "Error",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    Public,
    Restricted,
    Private,
}
cap_enum!(Scope {
    Public => "Public",
    Restricted => "Restricted",
    Private => "Private",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Geo,
    Met,
    Safety,
    Security,
    Rescue,
    Fire,
    Health,
    Env,
    Transport,
    Infra,
    #[serde(rename = "CBRNE")]
    Cbrne,
    Other,
}
cap_enum!(Category {
    Geo => "Geo",
    Met => "Met",
    Safety => "Safety",
    Security => "Security",
    Rescue => "Rescue",
    Fire => "Fire",
    Health => "Health",
    Env => "Env",
    Transport => "Transport",
    Infra => "Infra",
    Cbrne => "CBRNE",
    Other => "Other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Urgency {
    Immediate,
    Expected,
    Future,
    Past,
    Unknown,
}
cap_enum!(Urgency {
    Immediate => "Immediate",
    Expected => "Expected",
    Future => "Future",
    Past => "Past",
    Unknown => "Unknown",
});

/// Ordered from least to most severe so callers can take a `max()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Unknown,
    Minor,
    Moderate,
    Severe,
    Extreme,
}
cap_enum!(Severity {
    Unknown => "Unknown",
    Minor => "Minor",
    Moderate => "Moderate",
    Severe => "Severe",
    Extreme => "Extreme",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Certainty {
    Observed,
    Likely,
    Possible,
    Unlikely,
    Unknown,
}
cap_enum!(Certainty {
    Observed => "Observed",
    Likely => "Likely",
    Possible => "Possible",
    Unlikely => "Unlikely",
    Unknown => "Unknown",
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// The `<info>` block selected for this alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Info {
    pub language: Option<String>,
    pub categories: Vec<Category>,
    pub event: String,
    pub urgency: Urgency,
    pub severity: Severity,
    pub certainty: Certainty,
    pub effective: Option<DateTime<Utc>>,
    pub onset: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
    pub sender_name: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub web: Option<String>,
    pub parameters: Vec<Parameter>,
    pub areas: Vec<Area>,
}

impl Info {
    pub fn has_category(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    /// True when any area carries a usable polygon or circle.
    pub fn has_geometry(&self) -> bool {
        self.areas.iter().any(Area::has_geometry)
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub identifier: String,
    pub sender: String,
    pub sent: DateTime<Utc>,
    pub status: Status,
    pub msg_type: MsgType,
    pub scope: Scope,
    pub references: Vec<Reference>,
    pub info: Info,
    /// Reference (URL) this document was fetched from.
    pub source: String,
}

impl Alert {
    /// Expiry is exclusive: an alert expiring exactly at `now` is already over.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.info.expires {
            Some(expires) => expires <= now,
            None => true,
        }
    }

    pub fn referenced_identifiers(&self) -> impl Iterator<Item = &str> {
        self.references.iter().map(|r| r.identifier.as_str())
    }
}

/// Parse a CAP/Atom timestamp (RFC 3339, `-00:00` allowed) into UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
