//! Node, edge and score types of the entity relationship graph.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dense index of a node inside a [`crate::graph::RiskGraph`].
pub type NodeIdx = usize;

/// Dense index of an edge inside a [`crate::graph::RiskGraph`].
pub type EdgeIdx = usize;

// ============================================================================
// Node Types
// ============================================================================

/// Kind of entity a node represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Natural person (legal representative, executive).
    Person,
    /// Company.
    Company,
    /// Contract between companies.
    Contract,
    /// Lawsuit or dispute.
    LegalEvent,
    /// Payment transaction.
    Transaction,
}

/// Administrative penalty on record for a company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminPenalty {
    /// Fine amount.
    pub amount: f64,
    /// Processing status.
    pub status: String,
    /// Free-text description, used to infer severity.
    pub description: String,
    /// Decision date.
    pub date: Option<NaiveDate>,
}

/// Business-abnormal listing on record for a company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessAbnormal {
    /// Listing status (e.g. `listed`, `removed`).
    pub status: String,
    /// Reason for listing.
    pub reason: String,
    /// Listing date.
    pub register_date: Option<NaiveDate>,
}

/// Person attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonAttrs {
    /// Display name.
    pub name: String,
    /// Contact phone.
    pub phone: Option<String>,
}

/// Company attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyAttrs {
    /// Registered name.
    pub name: String,
    /// Legal representative as registered.
    pub legal_person: Option<String>,
    /// Unified social credit code.
    pub credit_code: Option<String>,
    /// Registration status.
    pub status: Option<String>,
    /// Belongs to the auditing group itself.
    pub internal: bool,
    /// Administrative penalties.
    pub penalties: Vec<AdminPenalty>,
    /// Business-abnormal listings.
    pub abnormal_records: Vec<BusinessAbnormal>,
}

/// Contract attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractAttrs {
    /// Contract title.
    pub name: String,
    /// Contract number.
    pub contract_no: Option<String>,
    /// Contract amount.
    pub amount: f64,
    /// Signing date.
    pub sign_date: Option<NaiveDate>,
    /// Status.
    pub status: Option<String>,
}

/// Legal event attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalEventAttrs {
    /// Category (`Case`, `Dispute`, ...).
    pub category: String,
    /// Title.
    pub name: String,
    /// Amount in dispute.
    pub amount: f64,
    /// Status code (`F` filed, `I` first instance, `J` enforcement, `N` closed).
    pub status: String,
    /// Registration date.
    pub register_date: Option<NaiveDate>,
}

/// Transaction attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionAttrs {
    /// Amount transferred.
    pub amount: f64,
    /// Value date.
    pub date: Option<NaiveDate>,
    /// Transaction kind.
    pub kind: Option<String>,
    /// Number of the contract the transaction settles.
    pub contract_no: Option<String>,
    /// Amount settled so far.
    pub paid_amount: f64,
    /// Date by which it must be settled or delivered.
    pub due_date: Option<NaiveDate>,
    /// Performance status (`C` when fulfilled).
    pub status: Option<String>,
}

/// Type-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "attributes")]
pub enum NodeKind {
    /// Person.
    Person(PersonAttrs),
    /// Company.
    Company(CompanyAttrs),
    /// Contract.
    Contract(ContractAttrs),
    /// Legal event.
    LegalEvent(LegalEventAttrs),
    /// Transaction.
    Transaction(TransactionAttrs),
    /// Referenced by an edge but never described.
    Stub,
}

/// A node: opaque id plus typed attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Globally unique id.
    pub id: String,
    /// Attributes.
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    /// Create a stub node.
    pub fn stub(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Stub,
        }
    }

    /// Create a person node.
    pub fn person(id: impl Into<String>, attrs: PersonAttrs) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Person(attrs),
        }
    }

    /// Create a company node.
    pub fn company(id: impl Into<String>, attrs: CompanyAttrs) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Company(attrs),
        }
    }

    /// Create a contract node.
    pub fn contract(id: impl Into<String>, attrs: ContractAttrs) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Contract(attrs),
        }
    }

    /// Create a legal event node.
    pub fn legal_event(id: impl Into<String>, attrs: LegalEventAttrs) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::LegalEvent(attrs),
        }
    }

    /// Create a transaction node.
    pub fn transaction(id: impl Into<String>, attrs: TransactionAttrs) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Transaction(attrs),
        }
    }

    /// Node type, `None` for stubs.
    pub fn node_type(&self) -> Option<NodeType> {
        match self.kind {
            NodeKind::Person(_) => Some(NodeType::Person),
            NodeKind::Company(_) => Some(NodeType::Company),
            NodeKind::Contract(_) => Some(NodeType::Contract),
            NodeKind::LegalEvent(_) => Some(NodeType::LegalEvent),
            NodeKind::Transaction(_) => Some(NodeType::Transaction),
            NodeKind::Stub => None,
        }
    }

    /// True for nodes only known through an edge.
    pub fn is_stub(&self) -> bool {
        matches!(self.kind, NodeKind::Stub)
    }

    /// Human-readable label, falling back to the id.
    pub fn label(&self) -> &str {
        let name = match &self.kind {
            NodeKind::Person(p) => p.name.as_str(),
            NodeKind::Company(c) => c.name.as_str(),
            NodeKind::Contract(c) => c.name.as_str(),
            NodeKind::LegalEvent(e) => e.name.as_str(),
            NodeKind::Transaction(_) | NodeKind::Stub => "",
        };
        if name.is_empty() {
            &self.id
        } else {
            name
        }
    }

    /// Person attributes, if this is a person.
    pub fn as_person(&self) -> Option<&PersonAttrs> {
        match &self.kind {
            NodeKind::Person(p) => Some(p),
            _ => None,
        }
    }

    /// Company attributes, if this is a company.
    pub fn as_company(&self) -> Option<&CompanyAttrs> {
        match &self.kind {
            NodeKind::Company(c) => Some(c),
            _ => None,
        }
    }

    /// Contract attributes, if this is a contract.
    pub fn as_contract(&self) -> Option<&ContractAttrs> {
        match &self.kind {
            NodeKind::Contract(c) => Some(c),
            _ => None,
        }
    }

    /// Legal event attributes, if this is a legal event.
    pub fn as_legal_event(&self) -> Option<&LegalEventAttrs> {
        match &self.kind {
            NodeKind::LegalEvent(e) => Some(e),
            _ => None,
        }
    }

    /// Transaction attributes, if this is a transaction.
    pub fn as_transaction(&self) -> Option<&TransactionAttrs> {
        match &self.kind {
            NodeKind::Transaction(t) => Some(t),
            _ => None,
        }
    }
}

// ============================================================================
// Edge Types
// ============================================================================

/// Relation type of a directed edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// Company controls company.
    Controls,
    /// Person is the legal representative of company.
    LegalPerson,
    /// Company trades with company.
    TradesWith,
    /// Company supplies company.
    IsSupplier,
    /// Company is a customer of company.
    IsCustomer,
    /// Company pays a transaction.
    Pays,
    /// Transaction is received by company.
    Receives,
    /// Company is the initiating party of a contract.
    PartyA,
    /// Company is the responding party of a contract.
    PartyB,
    /// Contract relates to a legal event.
    RelatedTo,
    /// Person is involved in a legal event.
    InvolvedIn,
    /// Person is employed by company.
    EmployedBy,
    /// Contract has company as a party (reverse of PARTY_A / PARTY_B).
    HasParty,
}

impl EdgeType {
    /// All edge types.
    pub const ALL: &'static [EdgeType] = &[
        EdgeType::Controls,
        EdgeType::LegalPerson,
        EdgeType::TradesWith,
        EdgeType::IsSupplier,
        EdgeType::IsCustomer,
        EdgeType::Pays,
        EdgeType::Receives,
        EdgeType::PartyA,
        EdgeType::PartyB,
        EdgeType::RelatedTo,
        EdgeType::InvolvedIn,
        EdgeType::EmployedBy,
        EdgeType::HasParty,
    ];

    /// Name as used in weight tables and snapshots.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Controls => "CONTROLS",
            EdgeType::LegalPerson => "LEGAL_PERSON",
            EdgeType::TradesWith => "TRADES_WITH",
            EdgeType::IsSupplier => "IS_SUPPLIER",
            EdgeType::IsCustomer => "IS_CUSTOMER",
            EdgeType::Pays => "PAYS",
            EdgeType::Receives => "RECEIVES",
            EdgeType::PartyA => "PARTY_A",
            EdgeType::PartyB => "PARTY_B",
            EdgeType::RelatedTo => "RELATED_TO",
            EdgeType::InvolvedIn => "INVOLVED_IN",
            EdgeType::EmployedBy => "EMPLOYED_BY",
            EdgeType::HasParty => "HAS_PARTY",
        }
    }

    /// Parse a table name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Contract party edge (PARTY_A or PARTY_B).
    #[must_use]
    pub const fn is_party(&self) -> bool {
        matches!(self, EdgeType::PartyA | EdgeType::PartyB)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Descriptive properties carried by an edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeProperties {
    /// Traded or paid amount.
    pub amount: Option<f64>,
    /// Date of the trade or relation.
    pub date: Option<NaiveDate>,
    /// Position held (EMPLOYED_BY).
    pub position: Option<String>,
    /// Anything else the source supplied.
    pub extra: BTreeMap<String, String>,
}

impl EdgeProperties {
    /// Properties with an amount and an optional date.
    pub fn amount(amount: f64, date: Option<NaiveDate>) -> Self {
        Self {
            amount: Some(amount),
            date,
            ..Default::default()
        }
    }

    /// Properties with a position.
    pub fn position(position: impl Into<String>) -> Self {
        Self {
            position: Some(position.into()),
            ..Default::default()
        }
    }
}

/// A directed, typed edge between two node indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Source node.
    pub from: NodeIdx,
    /// Target node.
    pub to: NodeIdx,
    /// Relation type.
    pub edge_type: EdgeType,
    /// Explicit propagation weight in [0, 1], if supplied.
    pub weight: Option<f64>,
    /// Descriptive properties.
    pub properties: EdgeProperties,
}

// ============================================================================
// Scores
// ============================================================================

/// Score of a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeScore {
    /// Node id.
    pub node_id: String,
    /// Score value.
    pub score: f64,
}
