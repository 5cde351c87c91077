//! Integration tests for GraphRisk
//!
//! These tests load graphs through the store boundary and run the analyses the
//! way a caller would.

use chrono::NaiveDate;
use graphrisk::compliance::collusion::CollusionDetector;
use graphrisk::compliance::messages::{CollusionInput, PerformRiskInput};
use graphrisk::compliance::perform_risk::OverdueKind;
use graphrisk::core::traits::BatchAnalysis;
use graphrisk::graph::messages::SubgraphInput;
use graphrisk::graph::subgraph::ContractSubgraph;
use graphrisk::graph::types::{
    CompanyAttrs, ContractAttrs, LegalEventAttrs, PersonAttrs, TransactionAttrs,
};
use graphrisk::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn date(month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, 1).unwrap()
}

fn company(id: &str) -> Node {
    Node::company(
        id,
        CompanyAttrs {
            name: format!("{} Ltd", id),
            ..Default::default()
        },
    )
}

/// X, Y and Z share legal person P and win six contracts in rotation. K1 has a
/// legal event. T1, T2 and T3 trade in a ring with equal amounts.
fn portfolio() -> SnapshotSource {
    let mut source = SnapshotSource::new()
        .with_node(company("X"))
        .with_node(company("Y"))
        .with_node(company("Z"))
        .with_node(Node::person(
            "P",
            PersonAttrs {
                name: "P".to_string(),
                phone: None,
            },
        ))
        .with_node(Node::legal_event(
            "E1",
            LegalEventAttrs {
                category: "Case".to_string(),
                name: "Contract dispute".to_string(),
                amount: 500_000.0,
                status: "J".to_string(),
                register_date: Some(date(3)),
            },
        ));

    for id in ["X", "Y", "Z"] {
        source = source.with_edge("P", id, EdgeType::LegalPerson, EdgeProperties::default());
    }

    let amounts = [950_000.0, 960_000.0, 955_000.0, 945_000.0, 958_000.0, 952_000.0];
    let winners = ["X", "Y", "Z", "X", "Y", "Z"];
    for (i, (amount, winner)) in amounts.iter().zip(winners).enumerate() {
        let id = format!("K{}", i + 1);
        source = source
            .with_node(Node::contract(
                &id,
                ContractAttrs {
                    name: format!("Tender {}", i + 1),
                    amount: *amount,
                    sign_date: Some(date(i as u32 + 1)),
                    ..Default::default()
                },
            ))
            .with_edge(winner, &id, EdgeType::PartyB, EdgeProperties::default());
    }
    source = source.with_edge("K1", "E1", EdgeType::RelatedTo, EdgeProperties::default());

    for (from, to) in [("T1", "T2"), ("T2", "T3"), ("T3", "T1")] {
        source = source.with_edge(
            from,
            to,
            EdgeType::TradesWith,
            EdgeProperties::amount(100.0, Some(date(5))),
        );
    }
    source
}

fn load(source: &SnapshotSource) -> Arc<RiskGraph> {
    Arc::new(GraphLoader::new().load(source).unwrap())
}

// ============================================================================
// Catalog and Registry Tests
// ============================================================================

#[test]
fn test_catalog_domains() {
    let domains = graphrisk::catalog::domains();
    assert_eq!(domains.len(), Domain::ALL.len());

    for info in &domains {
        assert!(!info.name.is_empty());
        assert!(!info.description.is_empty());
        assert!(info.analysis_count > 0, "{} has no analyses", info.name);
    }
}

#[test]
fn test_registry_lookup() {
    let registry = AnalysisRegistry::new();
    graphrisk::register_all(&registry).unwrap();

    let metadata = registry.require("compliance/fraud-rank").unwrap();
    assert_eq!(metadata.domain, Domain::RiskPropagation);
    assert!(metadata.iterative);
    assert!(registry.require("compliance/unknown").is_err());
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_snapshot_json_load() {
    let json = portfolio().to_json_string().unwrap();
    let source = SnapshotSource::from_json_str(&json).unwrap();
    let graph = load(&source);

    // Every edge counts once towards its source's out-degree.
    let total: usize = graph.nodes().iter().map(|n| graph.out_degree(&n.id)).sum();
    assert_eq!(total, graph.edge_count());

    // Six PARTY_B edges yield six derived HAS_PARTY edges.
    assert_eq!(graph.edges_of_type(EdgeType::HasParty).count(), 6);
    assert!(matches!(graph.get("X").unwrap().kind, NodeKind::Company(_)));
    assert!(matches!(graph.get("T1").unwrap().kind, NodeKind::Stub));
}

#[test]
fn test_scoped_load() {
    let scope = QueryScope::all().with_window(DateWindow::between(date(5), date(6)));
    let graph = GraphLoader::new()
        .with_edge_types(&[EdgeType::TradesWith])
        .with_scope(scope)
        .load(&portfolio())
        .unwrap();

    assert_eq!(graph.edge_count(), 3);
    assert!(graph.index_of("X").is_none());
}

// ============================================================================
// Suite
// ============================================================================

#[tokio::test]
async fn test_suite_end_to_end() {
    let graph = load(&portfolio());
    let report = AnalysisSuite::new(EngineConfig::default())
        .run(graph)
        .await
        .unwrap();

    assert_eq!(report.failure_count(), 0);

    let fraud = report.fraud_rank.completed().unwrap();
    assert!(fraud.report.seeded_nodes >= 1);
    assert!(fraud.result.get("K1") > 0.0);
    assert_eq!(fraud.report.companies[0].company_id, "X");

    let external = report.external_risk.completed().unwrap();
    assert_eq!(external.report.seeded_nodes, 0);

    let cycles = report.cycles.completed().unwrap();
    assert_eq!(cycles.cycles.len(), 1);
    assert!(cycles.cycles[0].suspicious);
    assert_eq!(cycles.cycles[0].similarity, 1.0);

    let ring: HashSet<&str> = ["X", "Y", "Z"].into_iter().collect();

    let shells = report.shell_clusters.completed().unwrap();
    assert_eq!(shells.len(), 1);
    let members: HashSet<&str> = shells[0].companies.iter().map(String::as_str).collect();
    assert_eq!(members, ring);

    let communities = report.collusion.completed().unwrap();
    assert_eq!(communities.len(), 1);
    let community = &communities[0];
    let members: HashSet<&str> = community.members.iter().map(String::as_str).collect();
    assert_eq!(members, ring);
    assert!(community.flagged);
    assert_eq!(community.features.rotation, 1.0);
    assert!(community.features.amount_similarity > 0.99);
    assert!(community.features.threshold_ratio > 0.0);

    let shell_companies = report.shell_companies.completed().unwrap();
    assert_eq!(shell_companies.companies.len(), 3);
    assert!(shell_companies.networks.is_empty());

    let perform = report.perform_risk.completed().unwrap();
    assert!(perform.overdue.is_empty());
}

#[tokio::test]
async fn test_suite_report_serializes() {
    let report = AnalysisSuite::new(EngineConfig::default())
        .run(load(&portfolio()))
        .await
        .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["collusion"]["status"], "completed");
    assert_eq!(value["node_count"], report.node_count);
    assert!(value["run_id"].is_string());
}

#[tokio::test]
async fn test_suite_with_toml_overrides() {
    let config = EngineConfig::from_toml_str(
        r#"
        [collusion]
        min_cluster_size = 4

        [suite]
        parallel = false
        timeout_secs = 60
        "#,
    )
    .unwrap();

    let report = AnalysisSuite::new(config)
        .run(load(&portfolio()))
        .await
        .unwrap();

    assert!(report.collusion.completed().unwrap().is_empty());
    assert_eq!(report.shell_clusters.completed().unwrap().len(), 1);
}

// ============================================================================
// Individual Analyses Through the Facade
// ============================================================================

#[tokio::test]
async fn test_collusion_batch_execute() {
    let detector = CollusionDetector::new();
    let output = detector
        .execute(CollusionInput::new(load(&portfolio())))
        .await
        .unwrap();

    assert_eq!(output.communities.len(), 1);
    assert_eq!(output.communities[0].network_id, "NETWORK_1");
    assert_eq!(output.communities[0].contract_count, 6);
}

#[tokio::test]
async fn test_contract_subgraph_execute() {
    let analysis = ContractSubgraph::new();
    let output = analysis
        .execute(SubgraphInput::new(load(&portfolio()), "K1"))
        .await
        .unwrap();

    let ids: HashSet<&str> = output
        .subgraph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .collect();
    assert!(ids.contains("K1"));
    assert!(ids.contains("E1"));
    assert!(ids.contains("X"));
}

#[tokio::test]
async fn test_perform_risk_batch_execute() {
    let source = portfolio()
        .with_node(Node::contract(
            "K7",
            ContractAttrs {
                name: "Steel supply - Y Ltd".to_string(),
                contract_no: Some("N7".to_string()),
                amount: 3_000_000.0,
                ..Default::default()
            },
        ))
        .with_edge("X", "K7", EdgeType::PartyA, EdgeProperties::default())
        .with_edge("Y", "K7", EdgeType::PartyB, EdgeProperties::default())
        .with_node(Node::transaction(
            "TX1",
            TransactionAttrs {
                amount: 3_000_000.0,
                paid_amount: 3_000_000.0,
                date: Some(date(1)),
                contract_no: Some("N7".to_string()),
                due_date: Some(date(2)),
                ..Default::default()
            },
        ))
        .with_edge("X", "TX1", EdgeType::Pays, EdgeProperties::default())
        .with_edge("TX1", "Y", EdgeType::Receives, EdgeProperties::default());

    // transaction attributes survive the JSON snapshot
    let json = source.to_json_string().unwrap();
    let graph = load(&SnapshotSource::from_json_str(&json).unwrap());

    let output = PerformRiskAnalysis::new()
        .execute(PerformRiskInput::new(graph, date(6)))
        .await
        .unwrap();

    let report = output.report;
    assert_eq!(report.overdue.len(), 2);
    assert!(report.overdue.iter().all(|o| o.kind == OverdueKind::Delivery));
    assert_eq!(report.overdue[0].overdue_days, 121);

    let ids: HashSet<&str> = report.companies.iter().map(|c| c.company_id.as_str()).collect();
    assert_eq!(ids, ["X", "Y"].into_iter().collect());
    assert!(report
        .companies
        .iter()
        .all(|c| c.risk_contracts.len() == 1 && c.risk_contracts[0].has_overdue));
    assert_eq!(report.companies[0].legal_person.as_deref(), Some("P"));
}
