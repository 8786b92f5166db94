use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bearer credential as sent in the `Authorization` header ("Bearer ...").
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Credential {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Account behind an accepted credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizedUser {
    /// `None` when the platform did not include a name.
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventReference {
    pub id: String,
    pub name: String,
    pub sale_start_at: DateTime<FixedOffset>,
}

/// One sellable ticket type as seen by a single inventory fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketVariant {
    pub inventory_id: String,
    pub name: String,
    pub max_reservable_quantity: u32,
}

/// Case-insensitive substring filter on variant names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTag(String);

impl SearchTag {
    /// Returns `None` for blank input, which means "no preference".
    pub fn new(raw: &str) -> Option<Self> {
        let tag = raw.trim().to_lowercase();
        if tag.is_empty() {
            None
        } else {
            Some(Self(tag))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, variant_name: &str) -> bool {
        variant_name.to_lowercase().contains(&self.0)
    }
}

impl fmt::Display for SearchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// Tag-matching variants at their maximum quantity
    TaggedMax,
    /// Every variant, one ticket each
    BroadMinimum,
    /// Every variant at its maximum quantity
    BroadMax,
}

impl TierKind {
    pub fn label(&self) -> &'static str {
        match self {
            TierKind::TaggedMax => "tagged_max",
            TierKind::BroadMinimum => "broad_minimum",
            TierKind::BroadMax => "broad_max",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Reserved,
    /// The platform answered with a non-200 status.
    Rejected(u16),
    /// The request never produced a status (transport error, client shut down).
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationAttempt {
    pub tier: TierKind,
    pub inventory_id: String,
    pub quantity: u32,
    pub status: AttemptStatus,
}

impl ReservationAttempt {
    pub fn succeeded(&self) -> bool {
        self.status == AttemptStatus::Reserved
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReservationOutcome {
    pub attempts: Vec<ReservationAttempt>,
    /// True iff at least one request in the whole run succeeded.
    pub reserved: bool,
}

impl ReservationOutcome {
    pub fn successful(&self) -> impl Iterator<Item = &ReservationAttempt> {
        self.attempts.iter().filter(|a| a.succeeded())
    }

    pub fn attempts_in(&self, tier: TierKind) -> impl Iterator<Item = &ReservationAttempt> {
        self.attempts.iter().filter(move |a| a.tier == tier)
    }
}
