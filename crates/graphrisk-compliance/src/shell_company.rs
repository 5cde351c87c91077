//! Per-company shell scoring.
//!
//! Where [`crate::shell`] scores clusters of related companies, this module
//! looks at each company on its own: how much of what flows in flows straight
//! back out, how quickly and to how few counterparties, and how many other
//! companies its legal representative heads. Representatives heading two or
//! more high-risk companies are reported as shell networks.

use crate::messages::{ShellCompanyInput, ShellCompanyOutput};
use crate::relations::{
    is_company_like, legal_person_name, legal_representatives, multi_company_persons,
    party_contracts, targets_of,
};
use async_trait::async_trait;
use graphrisk_core::{
    analysis::AnalysisMetadata,
    config::ShellCompanyConfig,
    domain::Domain,
    error::Result,
    traits::{Analysis, BatchAnalysis},
};
use graphrisk_graph::graph::RiskGraph;
use graphrisk_graph::types::{EdgeType, NodeIdx, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::info;

// ============================================================================
// Features
// ============================================================================

/// Money-flow and ownership features of one company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyFlowFeatures {
    /// Company id.
    pub company_id: String,
    /// `min(in, out) / max(in, out)`, 0 without flows.
    pub pass_through_ratio: f64,
    /// Average days between consecutive dated transactions.
    pub velocity_days: f64,
    /// Distinct counterparties per transaction.
    pub partner_diversity: f64,
    /// Transactions paid or received.
    pub transaction_count: usize,
    /// Sum of received transactions.
    pub total_inflow: f64,
    /// Sum of paid transactions.
    pub total_outflow: f64,
    /// Distinct counterparties.
    pub partner_count: usize,
    /// Other companies headed by the same legal representative.
    pub legal_person_company_count: usize,
    /// Contracts the company is party to.
    pub contract_count: usize,
}

/// Distinct transactions joined to `company` by `edge_type`, in edge order.
fn transactions(graph: &RiskGraph, company: NodeIdx, edge_type: EdgeType) -> Vec<NodeIdx> {
    let mut seen = HashSet::new();
    let linked: Vec<NodeIdx> = match edge_type {
        EdgeType::Pays => graph
            .out_edges_of_type(company, edge_type)
            .map(|e| e.to)
            .collect(),
        _ => graph
            .in_edges_of_type(company, edge_type)
            .map(|e| e.from)
            .collect(),
    };
    linked
        .into_iter()
        .filter(|&t| graph.node(t).as_transaction().is_some() && seen.insert(t))
        .collect()
}

/// Extract the flow features of one company.
pub fn company_features(graph: &RiskGraph, company: NodeIdx) -> CompanyFlowFeatures {
    let paid = transactions(graph, company, EdgeType::Pays);
    let received = transactions(graph, company, EdgeType::Receives);

    let sum = |txns: &[NodeIdx]| -> f64 {
        txns.iter()
            .filter_map(|&t| graph.node(t).as_transaction())
            .map(|t| t.amount)
            .sum()
    };
    let total_outflow = sum(&paid);
    let total_inflow = sum(&received);
    let high = total_inflow.max(total_outflow);
    let pass_through_ratio = if high > 0.0 {
        total_inflow.min(total_outflow) / high
    } else {
        0.0
    };

    let mut dates: Vec<_> = paid
        .iter()
        .chain(&received)
        .filter_map(|&t| graph.node(t).as_transaction().and_then(|a| a.date))
        .collect();
    dates.sort_unstable();
    let velocity_days = match (dates.first(), dates.last()) {
        (Some(first), Some(last)) if dates.len() > 1 => {
            (*last - *first).num_days() as f64 / (dates.len() - 1) as f64
        }
        _ => 0.0,
    };

    let mut partners = HashSet::new();
    for &t in &paid {
        partners.extend(graph.out_edges_of_type(t, EdgeType::Receives).map(|e| e.to));
    }
    for &t in &received {
        partners.extend(graph.in_edges_of_type(t, EdgeType::Pays).map(|e| e.from));
    }

    let transaction_count = paid.len() + received.len();
    let partner_diversity = if transaction_count > 0 {
        partners.len() as f64 / transaction_count as f64
    } else {
        0.0
    };

    let legal_person_company_count = legal_representatives(graph, company)
        .into_iter()
        .map(|person| {
            targets_of(graph, person, EdgeType::LegalPerson)
                .into_iter()
                .filter(|&c| c != company && is_company_like(graph, c))
                .count()
        })
        .max()
        .unwrap_or(0);

    CompanyFlowFeatures {
        company_id: graph.id(company).to_string(),
        pass_through_ratio,
        velocity_days,
        partner_diversity,
        transaction_count,
        total_inflow,
        total_outflow,
        partner_count: partners.len(),
        legal_person_company_count,
        contract_count: party_contracts(graph, company).len(),
    }
}

/// Shell score of one company, capped at 1.
pub fn shell_company_score(features: &CompanyFlowFeatures, config: &ShellCompanyConfig) -> f64 {
    let w = &config.weights;
    let mut score = 0.0;

    if features.pass_through_ratio >= config.pass_through_strong {
        score += w.pass_through_strong;
    } else if features.pass_through_ratio >= config.pass_through_weak {
        score += w.pass_through_weak;
    }

    let velocity = features.velocity_days;
    if velocity > 0.0 && velocity < config.fast_velocity_days {
        score += w.fast_velocity;
    } else if velocity >= config.fast_velocity_days && velocity < config.slow_velocity_days {
        score += w.slow_velocity;
    }

    // companies without transactions have no partners to be narrow about
    if features.transaction_count > 0 {
        if features.partner_diversity < config.low_diversity {
            score += w.low_diversity;
        } else if features.partner_diversity < config.medium_diversity {
            score += w.medium_diversity;
        }
    }

    if features.legal_person_company_count >= config.many_legal_companies {
        score += w.many_legal_companies;
    } else if features.legal_person_company_count >= config.some_legal_companies {
        score += w.some_legal_companies;
    }

    if features.contract_count > 0 {
        let average = (features.total_inflow + features.total_outflow) / features.contract_count as f64;
        if average > config.large_average_amount && features.contract_count < config.few_contracts {
            score += w.concentrated_contracts;
        }
    }

    score.min(1.0)
}

// ============================================================================
// Report Types
// ============================================================================

/// A scored company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellCompanyScore {
    /// Registered name.
    pub name: String,
    /// Legal representative.
    pub legal_person: Option<String>,
    /// Measured features.
    pub features: CompanyFlowFeatures,
    /// Score in [0, 1].
    pub score: f64,
    /// Score reached the high-risk threshold.
    pub high_risk: bool,
}

/// A legal representative heading several high-risk companies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellNetwork {
    /// Person id.
    pub person_id: String,
    /// Person name.
    pub legal_person: String,
    /// High-risk companies the person heads.
    pub companies: Vec<String>,
    /// Number of those companies.
    pub network_size: usize,
}

/// All scored companies and the networks among the high-risk ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShellCompanyReport {
    /// Companies, highest score first.
    pub companies: Vec<ShellCompanyScore>,
    /// Networks, largest first.
    pub networks: Vec<ShellNetwork>,
}

impl ShellCompanyReport {
    /// High-risk companies.
    pub fn high_risk(&self) -> impl Iterator<Item = &ShellCompanyScore> {
        self.companies.iter().filter(|c| c.high_risk)
    }
}

// ============================================================================
// Shell Company Scorer
// ============================================================================

/// Per-company shell scorer.
#[derive(Debug, Clone)]
pub struct ShellCompanyScorer {
    metadata: AnalysisMetadata,
}

impl ShellCompanyScorer {
    /// Create a new shell company scorer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: AnalysisMetadata::batch(
                "compliance/shell-companies",
                Domain::EntityClustering,
            )
            .with_description("Per-company pass-through, velocity and ownership scoring"),
        }
    }

    /// Score every company and group high-risk companies by representative.
    pub fn compute(graph: &RiskGraph, config: &ShellCompanyConfig) -> Result<ShellCompanyReport> {
        config.validate()?;

        let mut companies: Vec<ShellCompanyScore> = graph
            .nodes_of_type(NodeType::Company)
            .map(|(idx, node)| {
                let features = company_features(graph, idx);
                let score = shell_company_score(&features, config);
                ShellCompanyScore {
                    name: node.label().to_string(),
                    legal_person: legal_person_name(graph, idx),
                    features,
                    score,
                    high_risk: score >= config.high_risk_threshold,
                }
            })
            .collect();
        companies.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.features.company_id.cmp(&b.features.company_id))
        });

        let high: HashSet<&str> = companies
            .iter()
            .filter(|c| c.high_risk)
            .map(|c| c.features.company_id.as_str())
            .collect();

        let mut networks: Vec<ShellNetwork> = multi_company_persons(graph, EdgeType::LegalPerson)
            .into_iter()
            .filter_map(|(person, headed)| {
                let flagged: Vec<String> = headed
                    .into_iter()
                    .map(|c| graph.id(c))
                    .filter(|id| high.contains(id))
                    .map(str::to_string)
                    .collect();
                (flagged.len() >= 2).then(|| ShellNetwork {
                    person_id: graph.id(person).to_string(),
                    legal_person: graph.node(person).label().to_string(),
                    network_size: flagged.len(),
                    companies: flagged,
                })
            })
            .collect();
        networks.sort_by(|a, b| b.network_size.cmp(&a.network_size));

        Ok(ShellCompanyReport {
            companies,
            networks,
        })
    }
}

impl Default for ShellCompanyScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis for ShellCompanyScorer {
    fn metadata(&self) -> &AnalysisMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchAnalysis<ShellCompanyInput, ShellCompanyOutput> for ShellCompanyScorer {
    async fn execute(&self, input: ShellCompanyInput) -> Result<ShellCompanyOutput> {
        let start = Instant::now();
        let report = Self::compute(&input.graph, &input.config)?;
        let compute_time_us = start.elapsed().as_micros() as u64;

        info!(
            companies = report.companies.len(),
            high = report.high_risk().count(),
            networks = report.networks.len(),
            compute_time_us,
            "shell company scoring finished"
        );
        Ok(ShellCompanyOutput {
            report,
            compute_time_us,
        })
    }
}
