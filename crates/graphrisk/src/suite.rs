//! Concurrent execution of every graph-wide analysis over one shared graph.
//!
//! Each analysis runs on a tokio blocking worker and lands in its own
//! [`Outcome`] slot, so a failing analysis never hides the others. An optional
//! deadline trips the shared cancellation token; cancellable analyses then stop
//! at their next check and report the cancellation in their slot.

use chrono::{DateTime, NaiveDate, Utc};
use graphrisk_compliance::collusion::{CollusionCommunity, CollusionDetector};
use graphrisk_compliance::fan_pattern::{FanPatternDetector, FlowPattern};
use graphrisk_compliance::perform_risk::{PerformRiskAnalysis, PerformRiskReport};
use graphrisk_compliance::rank::{ExternalRiskRank, FraudRank, RiskRanking};
use graphrisk_compliance::seeds::ExternalSources;
use graphrisk_compliance::shell::{ShellCluster, ShellClusterDetector};
use graphrisk_compliance::shell_company::{ShellCompanyReport, ShellCompanyScorer};
use graphrisk_core::cancel::{CancellationToken, DeadlineContext};
use graphrisk_core::config::{DateWindow, EngineConfig};
use graphrisk_core::error::Result;
use graphrisk_graph::cycles::{CycleSearch, CycleSearchResult};
use graphrisk_graph::graph::RiskGraph;
use graphrisk_graph::similarity::SimilarityMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result slot for one analysis in a suite run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "value")]
pub enum Outcome<T> {
    /// The analysis finished.
    Completed(T),
    /// The analysis failed, was cancelled or its worker panicked.
    Failed(String),
}

impl<T> Outcome<T> {
    /// The result, if the analysis finished.
    pub fn completed(&self) -> Option<&T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    /// The failure message, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Failed(message) => Some(message),
        }
    }

    /// Returns true when the analysis finished.
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }
}

/// Everything one suite run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u64,
    /// Nodes in the analysed graph.
    pub node_count: usize,
    /// Edges in the analysed graph.
    pub edge_count: usize,
    /// Legal event fraud rank.
    pub fraud_rank: Outcome<RiskRanking>,
    /// Penalty and abnormal record risk rank.
    pub external_risk: Outcome<RiskRanking>,
    /// Circular trades.
    pub cycles: Outcome<CycleSearchResult>,
    /// Fan-out/fan-in money flows.
    pub fan_patterns: Outcome<Vec<FlowPattern>>,
    /// Shell entity clusters.
    pub shell_clusters: Outcome<Vec<ShellCluster>>,
    /// Per-company shell scores and networks.
    pub shell_companies: Outcome<ShellCompanyReport>,
    /// Collusion communities.
    pub collusion: Outcome<Vec<CollusionCommunity>>,
    /// Overdue performance risk.
    pub perform_risk: Outcome<PerformRiskReport>,
}

impl SuiteReport {
    /// Number of analyses that did not finish.
    pub fn failure_count(&self) -> usize {
        [
            self.fraud_rank.is_completed(),
            self.external_risk.is_completed(),
            self.cycles.is_completed(),
            self.fan_patterns.is_completed(),
            self.shell_clusters.is_completed(),
            self.shell_companies.is_completed(),
            self.collusion.is_completed(),
            self.perform_risk.is_completed(),
        ]
        .iter()
        .filter(|done| !**done)
        .count()
    }
}

/// Runs every graph-wide analysis with one configuration.
#[derive(Debug, Clone)]
pub struct AnalysisSuite {
    config: EngineConfig,
    similarity: Option<Arc<SimilarityMap>>,
    external_sources: ExternalSources,
    external_window: Option<DateWindow>,
    as_of: Option<NaiveDate>,
}

impl AnalysisSuite {
    /// Suite using `config` for every analysis.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            similarity: None,
            external_sources: ExternalSources::All,
            external_window: None,
            as_of: None,
        }
    }

    /// Share a similarity signal with both risk ranks.
    pub fn with_similarity(mut self, similarity: Arc<SimilarityMap>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// Restrict which records seed the external risk rank.
    pub fn with_external_sources(mut self, sources: ExternalSources) -> Self {
        self.external_sources = sources;
        self
    }

    /// Only seed the external risk rank from records inside `window`.
    pub fn with_external_window(mut self, window: DateWindow) -> Self {
        self.external_window = Some(window);
        self
    }

    /// Reference date for overdue checks. Defaults to today (UTC) at run time.
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every analysis, bounded by the configured deadline if any.
    ///
    /// Fails only when the configuration is invalid; analysis failures are
    /// reported in their slots.
    pub async fn run(&self, graph: Arc<RiskGraph>) -> Result<SuiteReport> {
        let Some(secs) = self.config.suite.timeout_secs else {
            return self
                .run_with_cancellation(graph, CancellationToken::new())
                .await;
        };

        let deadline = DeadlineContext::new(Duration::from_secs(secs));
        let report = self.run_with_cancellation(graph, deadline.token()).await?;
        if deadline.is_expired() {
            warn!(
                run_id = %report.run_id,
                timeout_secs = deadline.original_timeout().as_secs(),
                failures = report.failure_count(),
                "suite deadline passed"
            );
        }
        Ok(report)
    }

    /// Run every analysis with a caller-owned cancellation token.
    pub async fn run_with_cancellation(
        &self,
        graph: Arc<RiskGraph>,
        cancel: CancellationToken,
    ) -> Result<SuiteReport> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(
            %run_id,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            parallel = self.config.suite.parallel,
            "suite started"
        );

        let fraud_rank = {
            let (graph, config) = (Arc::clone(&graph), self.config.fraud_rank.clone());
            let (similarity, cancel) = (self.similarity.clone(), cancel.clone());
            move || FraudRank::compute(&graph, &config, similarity, &cancel)
        };
        let external_risk = {
            let (graph, config) = (Arc::clone(&graph), self.config.external_risk.clone());
            let (similarity, cancel) = (self.similarity.clone(), cancel.clone());
            let (sources, window) = (self.external_sources, self.external_window);
            move || {
                ExternalRiskRank::compute(
                    &graph,
                    &config,
                    sources,
                    window.as_ref(),
                    similarity,
                    &cancel,
                )
            }
        };
        let cycles = {
            let (graph, config, cancel) =
                (Arc::clone(&graph), self.config.cycles.clone(), cancel.clone());
            move || CycleSearch::compute(&graph, &config, None, &cancel)
        };
        let fan_patterns = {
            let (graph, config, cancel) =
                (Arc::clone(&graph), self.config.fan_pattern.clone(), cancel.clone());
            move || FanPatternDetector::compute(&graph, &config, &cancel)
        };
        let shell_clusters = {
            let (graph, config) = (Arc::clone(&graph), self.config.shell.clone());
            move || ShellClusterDetector::compute(&graph, &config)
        };
        let shell_companies = {
            let (graph, config) = (Arc::clone(&graph), self.config.shell_company.clone());
            move || ShellCompanyScorer::compute(&graph, &config)
        };
        let collusion = {
            let (graph, config) = (Arc::clone(&graph), self.config.collusion.clone());
            move || CollusionDetector::compute(&graph, &config)
        };
        let perform_risk = {
            let (graph, config) = (Arc::clone(&graph), self.config.perform_risk.clone());
            let as_of = self.as_of.unwrap_or_else(|| started_at.date_naive());
            move || PerformRiskAnalysis::compute(&graph, &config, as_of, None, None)
        };

        let (
            fraud_rank,
            external_risk,
            cycles,
            fan_patterns,
            shell_clusters,
            shell_companies,
            collusion,
            perform_risk,
        ) = if self.config.suite.parallel {
            tokio::join!(
                slot("fraud_rank", fraud_rank),
                slot("external_risk", external_risk),
                slot("cycles", cycles),
                slot("fan_patterns", fan_patterns),
                slot("shell_clusters", shell_clusters),
                slot("shell_companies", shell_companies),
                slot("collusion", collusion),
                slot("perform_risk", perform_risk),
            )
        } else {
            (
                slot("fraud_rank", fraud_rank).await,
                slot("external_risk", external_risk).await,
                slot("cycles", cycles).await,
                slot("fan_patterns", fan_patterns).await,
                slot("shell_clusters", shell_clusters).await,
                slot("shell_companies", shell_companies).await,
                slot("collusion", collusion).await,
                slot("perform_risk", perform_risk).await,
            )
        };

        let report = SuiteReport {
            run_id,
            started_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            fraud_rank,
            external_risk,
            cycles,
            fan_patterns,
            shell_clusters,
            shell_companies,
            collusion,
            perform_risk,
        };

        info!(
            %run_id,
            elapsed_ms = report.elapsed_ms,
            failures = report.failure_count(),
            "suite finished"
        );
        Ok(report)
    }
}

async fn slot<T, F>(name: &'static str, work: F) -> Outcome<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let start = Instant::now();
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(value)) => {
            debug!(
                analysis = name,
                elapsed_us = start.elapsed().as_micros() as u64,
                "analysis completed"
            );
            Outcome::Completed(value)
        }
        Ok(Err(e)) => {
            warn!(analysis = name, error = %e, "analysis failed");
            Outcome::Failed(e.to_string())
        }
        Err(e) => {
            warn!(analysis = name, error = %e, "analysis worker aborted");
            Outcome::Failed(format!("worker aborted: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrisk_graph::types::EdgeType;

    fn trade_ring() -> Arc<RiskGraph> {
        let mut graph = RiskGraph::new();
        graph.add_edge("A", "B", EdgeType::TradesWith, None);
        graph.add_edge("B", "C", EdgeType::TradesWith, None);
        graph.add_edge("C", "A", EdgeType::TradesWith, None);
        Arc::new(graph)
    }

    #[tokio::test]
    async fn test_all_slots_complete() {
        let suite = AnalysisSuite::new(EngineConfig::default());
        let report = suite.run(trade_ring()).await.unwrap();

        assert_eq!(report.failure_count(), 0);
        assert_eq!(report.node_count, 3);
        assert_eq!(report.edge_count, 3);
        assert_eq!(report.cycles.completed().unwrap().cycles.len(), 1);
    }

    #[tokio::test]
    async fn test_sequential_matches_parallel() {
        let mut config = EngineConfig::default();
        config.suite.parallel = false;
        let sequential = AnalysisSuite::new(config).run(trade_ring()).await.unwrap();
        let parallel = AnalysisSuite::new(EngineConfig::default())
            .run(trade_ring())
            .await
            .unwrap();

        assert_eq!(
            sequential.cycles.completed().unwrap(),
            parallel.cycles.completed().unwrap()
        );
        assert_ne!(sequential.run_id, parallel.run_id);
    }

    #[tokio::test]
    async fn test_cancelled_run_isolates_failures() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = AnalysisSuite::new(EngineConfig::default())
            .run_with_cancellation(trade_ring(), cancel)
            .await
            .unwrap();

        assert!(report.cycles.error().unwrap().contains("cancelled"));
        assert!(report.shell_clusters.is_completed());
        assert!(report.shell_companies.is_completed());
        assert!(report.collusion.is_completed());
        assert!(report.perform_risk.is_completed());
    }

    #[tokio::test]
    async fn test_perform_risk_uses_as_of() {
        use graphrisk_graph::types::{CompanyAttrs, ContractAttrs, Node, TransactionAttrs};

        let day = |m, d| NaiveDate::from_ymd_opt(2024, m, d).unwrap();
        let mut graph = RiskGraph::new();
        for id in ["A", "B"] {
            graph.add_node(Node::company(id, CompanyAttrs::default()));
        }
        graph.add_node(Node::contract(
            "K1",
            ContractAttrs {
                name: "Steel - B".into(),
                contract_no: Some("N1".into()),
                amount: 1_000_000.0,
                ..Default::default()
            },
        ));
        graph.add_edge("A", "K1", EdgeType::PartyA, None);
        graph.add_edge("B", "K1", EdgeType::PartyB, None);
        graph.add_node(Node::transaction(
            "T1",
            TransactionAttrs {
                amount: 1_000_000.0,
                contract_no: Some("N1".into()),
                due_date: Some(day(6, 1)),
                ..Default::default()
            },
        ));
        let graph = Arc::new(graph);

        let before = AnalysisSuite::new(EngineConfig::default())
            .with_as_of(day(5, 1))
            .run(Arc::clone(&graph))
            .await
            .unwrap();
        assert!(before.perform_risk.completed().unwrap().overdue.is_empty());

        let after = AnalysisSuite::new(EngineConfig::default())
            .with_as_of(day(7, 1))
            .run(graph)
            .await
            .unwrap();
        let report = after.perform_risk.completed().unwrap();
        assert_eq!(report.as_of, day(7, 1));
        assert_eq!(report.overdue.len(), 2);
        assert_eq!(report.companies.len(), 2);
        assert_eq!(after.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.shell.min_cluster_size = 1;
        let result = AnalysisSuite::new(config).run(trade_ring()).await;
        assert!(result.is_err());
    }
}
