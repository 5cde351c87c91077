//! Risk rank analyses.
//!
//! Both analyses seed the shared propagation engine from anomaly records and
//! report the highest-scoring companies:
//!
//! - `FraudRank`: legal events seed the contracts and persons they concern
//! - `ExternalRiskRank`: penalties and abnormal listings seed companies
//!
//! The report also ranks contracts by the highest score among their parties.

use crate::messages::{ExternalRiskInput, FraudRankInput, RankOutput};
use crate::relations::legal_person_name;
use crate::seeds::{external_seeds, legal_event_seeds, ExternalSources, SeedEvidence, SeedSet};
use async_trait::async_trait;
use graphrisk_core::{
    analysis::AnalysisMetadata,
    cancel::CancellationToken,
    config::{DateWindow, ExternalRiskConfig, FraudRankConfig, PropagationConfig, RiskBands},
    domain::{Domain, RiskLevel},
    error::Result,
    iterative::ConvergenceSummary,
    traits::{Analysis, BatchAnalysis},
};
use graphrisk_graph::graph::RiskGraph;
use graphrisk_graph::propagation::{PropagationEngine, PropagationResult};
use graphrisk_graph::similarity::SimilarityMap;
use graphrisk_graph::types::{EdgeType, NodeIdx, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

// ============================================================================
// Report
// ============================================================================

/// Whether a company's risk comes from its own records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSource {
    /// Seeded by the company's own records.
    Direct,
    /// Reached only through propagation.
    Propagated,
}

/// One company in the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRiskEntry {
    /// Company id.
    pub company_id: String,
    /// Registered name.
    pub name: String,
    /// Propagated score.
    pub score: f64,
    /// Banded level.
    pub level: RiskLevel,
    /// Legal representative.
    pub legal_person: Option<String>,
    /// Unified social credit code.
    pub credit_code: Option<String>,
    /// Direct or propagated.
    pub source: RiskSource,
    /// Records that seeded the company, if any.
    pub evidence: Vec<SeedEvidence>,
}

/// One contract in the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRiskEntry {
    /// Contract id.
    pub contract_id: String,
    /// Contract title.
    pub name: String,
    /// Highest score among ranked parties.
    pub score: f64,
}

/// Ranked companies and contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRankReport {
    /// Highest-scoring companies, best first.
    pub companies: Vec<CompanyRiskEntry>,
    /// Contracts of ranked companies, best first.
    pub contracts: Vec<ContractRiskEntry>,
    /// Number of seeded nodes.
    pub seeded_nodes: usize,
    /// How propagation ended.
    pub convergence: ConvergenceSummary,
}

impl RiskRankReport {
    /// Build a report from propagated scores.
    pub fn build(
        graph: &RiskGraph,
        result: &PropagationResult,
        seeds: &SeedSet,
        bands: &RiskBands,
        top_n: usize,
    ) -> Self {
        // Scores are in node order.
        let mut ranked: Vec<(NodeIdx, f64)> = result
            .scores
            .iter()
            .enumerate()
            .filter(|(idx, _)| graph.node(*idx).node_type() == Some(NodeType::Company))
            .map(|(idx, s)| (idx, s.score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(top_n);

        let companies: Vec<CompanyRiskEntry> = ranked
            .iter()
            .map(|&(idx, score)| company_entry(graph, idx, score, seeds, bands))
            .collect();

        Self {
            contracts: contract_ranking(graph, &ranked),
            companies,
            seeded_nodes: seeds.seeds.len(),
            convergence: result.convergence.clone(),
        }
    }

    /// Companies at or above a level.
    pub fn at_least(&self, level: RiskLevel) -> impl Iterator<Item = &CompanyRiskEntry> {
        self.companies.iter().filter(move |c| c.level >= level)
    }
}

fn company_entry(
    graph: &RiskGraph,
    idx: NodeIdx,
    score: f64,
    seeds: &SeedSet,
    bands: &RiskBands,
) -> CompanyRiskEntry {
    let node = graph.node(idx);
    let attrs = node.as_company();
    let evidence = seeds.evidence_for(&node.id).to_vec();

    let legal_person = legal_person_name(graph, idx);

    CompanyRiskEntry {
        company_id: node.id.clone(),
        name: node.label().to_string(),
        score,
        level: bands.classify(score),
        legal_person,
        credit_code: attrs.and_then(|a| a.credit_code.clone()),
        source: if evidence.is_empty() {
            RiskSource::Propagated
        } else {
            RiskSource::Direct
        },
        evidence,
    }
}

fn contract_ranking(graph: &RiskGraph, ranked: &[(NodeIdx, f64)]) -> Vec<ContractRiskEntry> {
    let mut best: HashMap<NodeIdx, f64> = HashMap::new();
    for &(company, score) in ranked {
        let parties = graph
            .out_edges_of_type(company, EdgeType::PartyA)
            .chain(graph.out_edges_of_type(company, EdgeType::PartyB));
        for edge in parties {
            let entry = best.entry(edge.to).or_insert(score);
            *entry = entry.max(score);
        }
    }

    let mut contracts: Vec<ContractRiskEntry> = best
        .into_iter()
        .map(|(idx, score)| ContractRiskEntry {
            contract_id: graph.id(idx).to_string(),
            name: graph.node(idx).label().to_string(),
            score,
        })
        .collect();
    contracts.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.contract_id.cmp(&b.contract_id))
    });
    contracts
}

/// Propagated scores plus the report built from them.
#[derive(Debug, Clone, Serialize)]
pub struct RiskRanking {
    /// Score of every node.
    pub result: PropagationResult,
    /// Company and contract ranking.
    pub report: RiskRankReport,
}

fn rank(
    graph: &RiskGraph,
    seeds: SeedSet,
    engine: PropagationEngine,
    bands: &RiskBands,
    top_n: usize,
    cancel: &CancellationToken,
) -> Result<RiskRanking> {
    let result = engine.run_cancellable(graph, &seeds.seeds, cancel)?;
    let report = RiskRankReport::build(graph, &result, &seeds, bands, top_n);
    Ok(RiskRanking { result, report })
}

fn engine(
    config: PropagationConfig,
    similarity: Option<Arc<SimilarityMap>>,
) -> Result<PropagationEngine> {
    let engine = PropagationEngine::new(config)?;
    Ok(match similarity {
        Some(similarity) => engine.with_similarity(similarity),
        None => engine,
    })
}

// ============================================================================
// Fraud Rank
// ============================================================================

/// Fraud rank analysis.
///
/// Legal events seed the contracts and persons attached to them; risk then
/// spreads over control, representation, payment, trade and party edges.
#[derive(Debug, Clone)]
pub struct FraudRank {
    metadata: AnalysisMetadata,
}

impl FraudRank {
    /// Create a new fraud rank analysis.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: AnalysisMetadata::batch("compliance/fraud-rank", Domain::RiskPropagation)
                .with_description("Legal event seeded risk propagation with company ranking")
                .iterative()
                .cancellable(),
        }
    }

    /// Seed, propagate and rank.
    pub fn compute(
        graph: &RiskGraph,
        config: &FraudRankConfig,
        similarity: Option<Arc<SimilarityMap>>,
        cancel: &CancellationToken,
    ) -> Result<RiskRanking> {
        config.validate()?;
        let seeds = legal_event_seeds(graph, config);
        let engine = engine(config.propagation.clone(), similarity)?;
        rank(graph, seeds, engine, &config.bands, config.top_n, cancel)
    }
}

impl Default for FraudRank {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis for FraudRank {
    fn metadata(&self) -> &AnalysisMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchAnalysis<FraudRankInput, RankOutput> for FraudRank {
    async fn execute(&self, input: FraudRankInput) -> Result<RankOutput> {
        let start = Instant::now();
        let ranking = Self::compute(&input.graph, &input.config, input.similarity, &input.cancel)?;
        let compute_time_us = start.elapsed().as_micros() as u64;

        info!(
            seeded = ranking.report.seeded_nodes,
            companies = ranking.report.companies.len(),
            compute_time_us,
            "fraud rank finished"
        );
        Ok(RankOutput {
            ranking,
            compute_time_us,
        })
    }
}

// ============================================================================
// External Risk Rank
// ============================================================================

/// External risk rank analysis.
///
/// Administrative penalties and business-abnormal listings seed the companies
/// carrying them; risk spreads over ownership, trade and representation.
#[derive(Debug, Clone)]
pub struct ExternalRiskRank {
    metadata: AnalysisMetadata,
}

impl ExternalRiskRank {
    /// Create a new external risk rank analysis.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: AnalysisMetadata::batch(
                "compliance/external-risk-rank",
                Domain::RiskPropagation,
            )
            .with_description("Penalty and abnormal listing seeded risk propagation")
            .iterative()
            .cancellable(),
        }
    }

    /// Seed from the selected records, propagate and rank.
    pub fn compute(
        graph: &RiskGraph,
        config: &ExternalRiskConfig,
        sources: ExternalSources,
        window: Option<&DateWindow>,
        similarity: Option<Arc<SimilarityMap>>,
        cancel: &CancellationToken,
    ) -> Result<RiskRanking> {
        config.validate()?;
        let seeds = external_seeds(graph, config, sources, window);
        let engine = engine(config.propagation.clone(), similarity)?;
        rank(graph, seeds, engine, &config.bands, config.top_n, cancel)
    }
}

impl Default for ExternalRiskRank {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis for ExternalRiskRank {
    fn metadata(&self) -> &AnalysisMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchAnalysis<ExternalRiskInput, RankOutput> for ExternalRiskRank {
    async fn execute(&self, input: ExternalRiskInput) -> Result<RankOutput> {
        let start = Instant::now();
        let ranking = Self::compute(
            &input.graph,
            &input.config,
            input.sources,
            input.window.as_ref(),
            input.similarity,
            &input.cancel,
        )?;
        let compute_time_us = start.elapsed().as_micros() as u64;

        info!(
            seeded = ranking.report.seeded_nodes,
            companies = ranking.report.companies.len(),
            sources = ?input.sources,
            compute_time_us,
            "external risk rank finished"
        );
        Ok(RankOutput {
            ranking,
            compute_time_us,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrisk_core::error::AnalysisError;
    use graphrisk_graph::types::{AdminPenalty, CompanyAttrs, LegalEventAttrs, Node, PersonAttrs};

    fn company(id: &str, name: &str) -> Node {
        Node::company(
            id,
            CompanyAttrs {
                name: name.to_string(),
                ..Default::default()
            },
        )
    }

    /// Litigated contract K1 between A and B; A's representative is P.
    fn litigation() -> RiskGraph {
        let mut graph = RiskGraph::new();
        graph.add_node(company("A", "Alpha"));
        graph.add_node(Node::company(
            "B",
            CompanyAttrs {
                name: "Beta".into(),
                legal_person: Some("Registered Rep".into()),
                credit_code: Some("91310000XXXX".into()),
                ..Default::default()
            },
        ));
        graph.add_node(Node::person(
            "P",
            PersonAttrs {
                name: "Pat".into(),
                phone: None,
            },
        ));
        graph.add_node(Node::legal_event(
            "E1",
            LegalEventAttrs {
                category: "Case".into(),
                amount: 10_000_000.0,
                status: "F".into(),
                ..Default::default()
            },
        ));
        graph.add_edge("A", "K1", EdgeType::PartyA, None);
        graph.add_edge("B", "K1", EdgeType::PartyB, None);
        graph.add_edge("K1", "A", EdgeType::HasParty, None);
        graph.add_edge("K1", "B", EdgeType::HasParty, None);
        graph.add_edge("K1", "E1", EdgeType::RelatedTo, None);
        graph.add_edge("P", "A", EdgeType::LegalPerson, None);
        graph
    }

    #[test]
    fn test_fraud_rank_metadata() {
        let analysis = FraudRank::new();
        assert_eq!(analysis.metadata().id, "compliance/fraud-rank");
        assert_eq!(analysis.metadata().domain, Domain::RiskPropagation);
        assert!(analysis.metadata().iterative);
    }

    #[test]
    fn test_fraud_rank_propagates_to_parties() {
        let graph = litigation();
        let ranking = FraudRank::compute(
            &graph,
            &FraudRankConfig::default(),
            None,
            &CancellationToken::new(),
        )
        .unwrap();

        let report = &ranking.report;
        assert_eq!(report.seeded_nodes, 1);
        assert!(report.convergence.converged);
        assert_eq!(report.companies.len(), 2);

        // Both parties receive the same share of K1; ties keep node order.
        let a = &report.companies[0];
        assert_eq!(a.company_id, "A");
        assert_eq!(a.source, RiskSource::Propagated);
        assert!(a.score > 0.0);
        assert_eq!(a.score, ranking.result.get("A"));
        assert_eq!(a.legal_person.as_deref(), Some("Pat"));

        let b = &report.companies[1];
        assert_eq!(b.legal_person.as_deref(), Some("Registered Rep"));
        assert_eq!(b.credit_code.as_deref(), Some("91310000XXXX"));

        assert_eq!(report.contracts.len(), 1);
        assert_eq!(report.contracts[0].contract_id, "K1");
        assert_eq!(report.contracts[0].score, a.score);
    }

    #[test]
    fn test_fraud_rank_invalid_config() {
        let mut config = FraudRankConfig::default();
        config.propagation.damping = 1.5;
        let err = FraudRank::compute(&litigation(), &config, None, &CancellationToken::new())
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_fraud_rank_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let err = FraudRank::compute(&litigation(), &FraudRankConfig::default(), None, &token)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled(_)));
    }

    fn penalised_group() -> RiskGraph {
        let mut graph = RiskGraph::new();
        graph.add_node(Node::company(
            "C1",
            CompanyAttrs {
                name: "Holding".into(),
                penalties: vec![AdminPenalty {
                    amount: 1_000_000.0,
                    status: String::new(),
                    description: "safety".into(),
                    date: None,
                }],
                ..Default::default()
            },
        ));
        graph.add_node(company("C2", "Subsidiary"));
        graph.add_node(company("C3", "Unrelated"));
        graph.add_edge("C1", "C2", EdgeType::Controls, None);
        graph
    }

    #[test]
    fn test_external_risk_direct_and_propagated() {
        let graph = penalised_group();
        let ranking = ExternalRiskRank::compute(
            &graph,
            &ExternalRiskConfig::default(),
            ExternalSources::All,
            None,
            None,
            &CancellationToken::new(),
        )
        .unwrap();

        let companies = &ranking.report.companies;
        assert_eq!(companies.len(), 3);

        // C1 keeps (1 - d) of its 0.85 seed; nothing flows back into it.
        assert_eq!(companies[0].company_id, "C1");
        assert_eq!(companies[0].source, RiskSource::Direct);
        assert_eq!(companies[0].evidence.len(), 1);
        assert!((companies[0].score - 0.15 * 0.85).abs() < 1e-9);
        assert_eq!(companies[0].level, RiskLevel::Low);

        assert_eq!(companies[1].company_id, "C2");
        assert_eq!(companies[1].source, RiskSource::Propagated);
        assert!((companies[1].score - 0.85 * 0.85 * companies[0].score).abs() < 1e-9);
        assert_eq!(companies[1].level, RiskLevel::Normal);

        assert_eq!(companies[2].score, 0.0);
        assert_eq!(ranking.report.at_least(RiskLevel::Low).count(), 1);
    }

    #[test]
    fn test_external_risk_top_n_and_sources() {
        let graph = penalised_group();
        let config = ExternalRiskConfig {
            top_n: 1,
            ..Default::default()
        };
        let ranking = ExternalRiskRank::compute(
            &graph,
            &config,
            ExternalSources::Abnormal,
            None,
            None,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(ranking.report.seeded_nodes, 0);
        assert_eq!(ranking.report.companies.len(), 1);
        assert!(ranking.report.companies.iter().all(|c| c.score == 0.0));
    }

    #[tokio::test]
    async fn test_external_risk_batch_execute() {
        let analysis = ExternalRiskRank::new();
        let input = ExternalRiskInput::new(Arc::new(penalised_group()));
        let output = analysis.execute(input).await.unwrap();
        assert_eq!(output.ranking.report.companies[0].company_id, "C1");
    }
}
