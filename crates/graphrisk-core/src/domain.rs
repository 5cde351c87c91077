//! Domain definitions for analysis categorization.
//!
//! Analyses are grouped by the kind of risk they look for. Domains are used for
//! discovery in the registry and for grouping in reports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk domain an analysis belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    /// Seeded risk diffusion: fraud rank, external risk rank
    RiskPropagation,

    /// Circular trades: cycle search, fan-out/fan-in patterns
    CircularTrade,

    /// Shell entity clustering across shared controllers
    EntityClustering,

    /// Collusion communities and bid rotation
    Collusion,

    /// Investigation views such as contract risk subgraphs
    Investigation,

    /// Overdue performance spreading to related counterparties
    Performance,
}

impl Domain {
    /// All available domains.
    pub const ALL: &'static [Domain] = &[
        Domain::RiskPropagation,
        Domain::CircularTrade,
        Domain::EntityClustering,
        Domain::Collusion,
        Domain::Investigation,
        Domain::Performance,
    ];

    /// Returns the domain name as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Domain::RiskPropagation => "RiskPropagation",
            Domain::CircularTrade => "CircularTrade",
            Domain::EntityClustering => "EntityClustering",
            Domain::Collusion => "Collusion",
            Domain::Investigation => "Investigation",
            Domain::Performance => "Performance",
        }
    }

    /// Parse a domain from a string, accepting the canonical name or kebab-case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RiskPropagation" | "risk-propagation" => Some(Domain::RiskPropagation),
            "CircularTrade" | "circular-trade" => Some(Domain::CircularTrade),
            "EntityClustering" | "entity-clustering" => Some(Domain::EntityClustering),
            "Collusion" | "collusion" => Some(Domain::Collusion),
            "Investigation" | "investigation" => Some(Domain::Investigation),
            "Performance" | "performance" => Some(Domain::Performance),
            _ => None,
        }
    }

    /// Short human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Domain::RiskPropagation => "Seeded risk diffusion over weighted business relations",
            Domain::CircularTrade => "Trade cycles and dispersal-then-convergence of funds",
            Domain::EntityClustering => "Companies likely controlled by the same real party",
            Domain::Collusion => "Related-party communities rotating contract awards",
            Domain::Investigation => "Bounded explanation subgraphs around a contract",
            Domain::Performance => "Overdue contracts and the related contracts they put at risk",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Banded risk level attached to scores in reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Below every band.
    Normal,
    /// Low risk.
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
}

impl RiskLevel {
    /// Returns the level name as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "NORMAL",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
