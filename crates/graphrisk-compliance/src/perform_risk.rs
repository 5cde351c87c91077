//! Performance risk.
//!
//! Transactions settle contracts by contract number. A transaction still open
//! after its due date is overdue, and every party company of its contract is
//! charged with it. The subject of an overdue contract (its name up to the
//! first `-`) is then searched across all contracts: contracts on the same
//! subject held by the overdue parties or their business partners are at risk
//! of the same failure.

use crate::messages::{PerformRiskInput, PerformRiskOutput};
use crate::relations::{business_partners, legal_person_name};
use async_trait::async_trait;
use chrono::NaiveDate;
use graphrisk_core::{
    analysis::AnalysisMetadata,
    config::{DateWindow, PerformRiskConfig},
    domain::Domain,
    error::Result,
    traits::{Analysis, BatchAnalysis},
};
use graphrisk_graph::graph::RiskGraph;
use graphrisk_graph::types::{NodeIdx, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

// ============================================================================
// Overdue Transactions
// ============================================================================

/// What is late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverdueKind {
    /// Fully paid but not delivered.
    Delivery,
    /// Neither fully paid nor delivered.
    PaymentAndDelivery,
}

/// An overdue transaction charged to one party company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdueTransaction {
    /// Transaction id.
    pub transaction_id: String,
    /// Contract number shared by the transaction and contract.
    pub contract_no: String,
    /// Contract id.
    pub contract_id: String,
    /// Contract title.
    pub contract_name: String,
    /// Party company id.
    pub company_id: String,
    /// Party company name.
    pub company_name: String,
    /// Amount due.
    pub amount: f64,
    /// Amount settled.
    pub paid_amount: f64,
    /// Due date.
    pub due_date: NaiveDate,
    /// Days past the due date.
    pub overdue_days: i64,
    /// What is late.
    pub kind: OverdueKind,
}

/// Subject of a contract title: the text before the first `-`, trimmed.
pub fn contract_subject(name: &str) -> &str {
    name.split('-').next().unwrap_or(name).trim()
}

struct ContractRef {
    contract: NodeIdx,
    parties: Vec<NodeIdx>,
}

/// Contracts by number: the first contract carrying it and the distinct
/// party companies of every contract carrying it.
fn contracts_by_number(graph: &RiskGraph) -> HashMap<&str, ContractRef> {
    let mut by_number: HashMap<&str, ContractRef> = HashMap::new();
    for (idx, node) in graph.nodes_of_type(NodeType::Contract) {
        let Some(number) = node
            .as_contract()
            .and_then(|c| c.contract_no.as_deref())
            .filter(|n| !n.is_empty())
        else {
            continue;
        };
        let entry = by_number.entry(number).or_insert_with(|| ContractRef {
            contract: idx,
            parties: Vec::new(),
        });
        for party in party_companies(graph, idx) {
            if !entry.parties.contains(&party) {
                entry.parties.push(party);
            }
        }
    }
    by_number
}

/// Distinct Company nodes on either side of a contract.
fn party_companies(graph: &RiskGraph, contract: NodeIdx) -> Vec<NodeIdx> {
    let mut seen = HashSet::new();
    graph
        .in_edges(contract)
        .iter()
        .map(|&e| graph.edge(e))
        .filter(|e| e.edge_type.is_party())
        .map(|e| e.from)
        .filter(|&c| graph.node(c).as_company().is_some() && seen.insert(c))
        .collect()
}

/// Transactions open after their due date, one record per party company.
///
/// `companies` restricts the charged parties; `window` keeps only
/// transactions dated inside it.
pub fn overdue_transactions(
    graph: &RiskGraph,
    config: &PerformRiskConfig,
    as_of: NaiveDate,
    companies: Option<&HashSet<&str>>,
    window: Option<&DateWindow>,
) -> Vec<OverdueTransaction> {
    let contracts = contracts_by_number(graph);
    let mut overdue = Vec::new();

    for (idx, node) in graph.nodes_of_type(NodeType::Transaction) {
        let Some(txn) = node.as_transaction() else {
            continue;
        };
        if let Some(window) = window {
            if !txn.date.is_some_and(|d| window.contains(d)) {
                continue;
            }
        }
        if txn.status.as_deref() == Some(config.completed_status.as_str()) {
            continue;
        }
        let Some(due_date) = txn.due_date.filter(|due| *due < as_of) else {
            continue;
        };
        let Some(number) = txn.contract_no.as_deref() else {
            continue;
        };
        let Some(contract) = contracts.get(number) else {
            continue;
        };

        let kind = if txn.amount > txn.paid_amount {
            OverdueKind::PaymentAndDelivery
        } else {
            OverdueKind::Delivery
        };
        let contract_node = graph.node(contract.contract);
        for &party in &contract.parties {
            let company_id = graph.id(party);
            if companies.is_some_and(|filter| !filter.contains(company_id)) {
                continue;
            }
            overdue.push(OverdueTransaction {
                transaction_id: graph.id(idx).to_string(),
                contract_no: number.to_string(),
                contract_id: contract_node.id.clone(),
                contract_name: contract_node
                    .as_contract()
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                company_id: company_id.to_string(),
                company_name: graph.node(party).label().to_string(),
                amount: txn.amount,
                paid_amount: txn.paid_amount,
                due_date,
                overdue_days: (as_of - due_date).num_days(),
                kind,
            });
        }
    }
    overdue
}

// ============================================================================
// Risk Contracts
// ============================================================================

/// A contract on an overdue subject held by an exposed company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskContract {
    /// Contract id.
    pub contract_id: String,
    /// Contract number.
    pub contract_no: Option<String>,
    /// Contract title.
    pub name: String,
    /// Contract amount.
    pub amount: f64,
    /// Contract status.
    pub status: Option<String>,
    /// The contract itself has overdue transactions.
    pub has_overdue: bool,
    /// Subject it was matched on.
    pub subject: String,
}

/// Risk contracts per company id.
///
/// Exposed companies are the overdue parties and their business partners.
/// A contract matching several subjects is listed once per company, under
/// the first subject in sorted order.
pub fn risk_contracts(
    graph: &RiskGraph,
    overdue: &[OverdueTransaction],
) -> BTreeMap<String, Vec<RiskContract>> {
    let mut subjects: BTreeSet<&str> = BTreeSet::new();
    let mut overdue_contracts: HashSet<&str> = HashSet::new();
    let mut exposed: HashSet<NodeIdx> = HashSet::new();

    for record in overdue {
        if record.contract_name.is_empty() {
            continue;
        }
        overdue_contracts.insert(record.contract_id.as_str());
        let subject = contract_subject(&record.contract_name);
        if !subject.is_empty() {
            subjects.insert(subject);
        }
        if let Some(company) = graph.index_of(&record.company_id) {
            exposed.insert(company);
        }
    }
    let partners: Vec<NodeIdx> = exposed
        .iter()
        .flat_map(|&c| business_partners(graph, c))
        .collect();
    exposed.extend(partners);

    let mut by_company: BTreeMap<String, Vec<RiskContract>> = BTreeMap::new();
    let mut listed: HashSet<(NodeIdx, NodeIdx)> = HashSet::new();
    for subject in subjects {
        for (idx, node) in graph.nodes_of_type(NodeType::Contract) {
            let Some(attrs) = node.as_contract() else {
                continue;
            };
            if !attrs.name.contains(subject) {
                continue;
            }
            for company in party_companies(graph, idx) {
                if !exposed.contains(&company) || !listed.insert((company, idx)) {
                    continue;
                }
                by_company
                    .entry(graph.id(company).to_string())
                    .or_default()
                    .push(RiskContract {
                        contract_id: node.id.clone(),
                        contract_no: attrs.contract_no.clone(),
                        name: attrs.name.clone(),
                        amount: attrs.amount,
                        status: attrs.status.clone(),
                        has_overdue: overdue_contracts.contains(node.id.as_str()),
                        subject: subject.to_string(),
                    });
            }
        }
    }
    by_company
}

/// Score of one company from its overdue records and risk contracts, capped at 1.
pub fn perform_score(
    overdue: &[&OverdueTransaction],
    contracts: &[RiskContract],
    config: &PerformRiskConfig,
) -> f64 {
    let mut score = 0.0;

    if let Some(max_days) = overdue.iter().map(|t| t.overdue_days).max() {
        let severity = (max_days.max(0) as f64 / config.severity_horizon_days)
            .powf(config.severity_exponent)
            .min(1.0);
        let multiplier = 1.0 + severity * config.severity_boost;
        score += (overdue.len() as f64 * config.overdue_weight * multiplier).min(config.overdue_cap);
    }

    if !contracts.is_empty() {
        let late = contracts.iter().filter(|c| c.has_overdue).count();
        score += late as f64 / contracts.len() as f64 * config.overdue_contract_weight;
    }

    let total: f64 = contracts.iter().map(|c| c.amount).sum();
    if total > 0.0 {
        score += (total / config.amount_ceiling).min(1.0) * config.amount_weight;
    }

    score.min(1.0)
}

// ============================================================================
// Report Types
// ============================================================================

/// A company exposed to performance risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformRiskEntry {
    /// Company id.
    pub company_id: String,
    /// Registered name.
    pub name: String,
    /// Score in [0, 1].
    pub score: f64,
    /// Overdue transactions charged to the company.
    pub overdue_count: usize,
    /// Legal representative.
    pub legal_person: Option<String>,
    /// Unified social credit code.
    pub credit_code: Option<String>,
    /// Contracts at risk.
    pub risk_contracts: Vec<RiskContract>,
}

/// Overdue transactions and the highest-scoring exposed companies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformRiskReport {
    /// Reference date.
    pub as_of: NaiveDate,
    /// Overdue records in transaction order.
    pub overdue: Vec<OverdueTransaction>,
    /// Companies, highest score first.
    pub companies: Vec<PerformRiskEntry>,
}

// ============================================================================
// Perform Risk Analysis
// ============================================================================

/// Overdue performance analysis.
#[derive(Debug, Clone)]
pub struct PerformRiskAnalysis {
    metadata: AnalysisMetadata,
}

impl PerformRiskAnalysis {
    /// Create a new performance risk analysis.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: AnalysisMetadata::batch("compliance/perform-risk", Domain::Performance)
                .with_description("Overdue transactions and same-subject contracts at risk"),
        }
    }

    /// Find overdue transactions as of `as_of` and rank the exposed companies.
    ///
    /// `companies` restricts both the charged parties and the ranked companies.
    pub fn compute(
        graph: &RiskGraph,
        config: &PerformRiskConfig,
        as_of: NaiveDate,
        companies: Option<&[String]>,
        window: Option<&DateWindow>,
    ) -> Result<PerformRiskReport> {
        config.validate()?;

        let filter: Option<HashSet<&str>> =
            companies.map(|ids| ids.iter().map(String::as_str).collect());
        let overdue = overdue_transactions(graph, config, as_of, filter.as_ref(), window);
        if overdue.is_empty() {
            debug!(%as_of, "no overdue transactions");
            return Ok(PerformRiskReport {
                as_of,
                overdue,
                companies: Vec::new(),
            });
        }

        let mut charged: HashMap<&str, Vec<&OverdueTransaction>> = HashMap::new();
        for record in &overdue {
            charged.entry(record.company_id.as_str()).or_default().push(record);
        }

        let mut entries: Vec<PerformRiskEntry> = risk_contracts(graph, &overdue)
            .into_iter()
            .filter_map(|(company_id, contracts)| {
                if filter.as_ref().is_some_and(|f| !f.contains(company_id.as_str())) {
                    return None;
                }
                let idx = graph.index_of(&company_id)?;
                let attrs = graph.node(idx).as_company()?;
                let records = charged.get(company_id.as_str()).map_or(&[][..], Vec::as_slice);
                Some(PerformRiskEntry {
                    name: graph.node(idx).label().to_string(),
                    score: perform_score(records, &contracts, config),
                    overdue_count: records.len(),
                    legal_person: legal_person_name(graph, idx),
                    credit_code: attrs.credit_code.clone(),
                    risk_contracts: contracts,
                    company_id,
                })
            })
            .collect();

        entries.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.company_id.cmp(&b.company_id))
        });
        entries.truncate(config.top_n);

        Ok(PerformRiskReport {
            as_of,
            overdue,
            companies: entries,
        })
    }
}

impl Default for PerformRiskAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis for PerformRiskAnalysis {
    fn metadata(&self) -> &AnalysisMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchAnalysis<PerformRiskInput, PerformRiskOutput> for PerformRiskAnalysis {
    async fn execute(&self, input: PerformRiskInput) -> Result<PerformRiskOutput> {
        let start = Instant::now();
        let report = Self::compute(
            &input.graph,
            &input.config,
            input.as_of,
            input.companies.as_deref(),
            input.window.as_ref(),
        )?;
        let compute_time_us = start.elapsed().as_micros() as u64;

        info!(
            as_of = %report.as_of,
            overdue = report.overdue.len(),
            companies = report.companies.len(),
            compute_time_us,
            "performance risk analysis finished"
        );
        Ok(PerformRiskOutput {
            report,
            compute_time_us,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrisk_graph::types::{CompanyAttrs, ContractAttrs, EdgeType, Node, TransactionAttrs};
    use std::sync::Arc;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn company(graph: &mut RiskGraph, id: &str) {
        graph.add_node(Node::company(
            id,
            CompanyAttrs {
                name: format!("{} Ltd", id),
                credit_code: Some(format!("CC-{}", id)),
                ..Default::default()
            },
        ));
    }

    fn contract(graph: &mut RiskGraph, id: &str, name: &str, amount: f64, a: &str, b: &str) {
        graph.add_node(Node::contract(
            id,
            ContractAttrs {
                name: name.into(),
                contract_no: Some(format!("NO-{}", id)),
                amount,
                ..Default::default()
            },
        ));
        graph.add_edge(a, id, EdgeType::PartyA, None);
        graph.add_edge(b, id, EdgeType::PartyB, None);
    }

    fn txn(graph: &mut RiskGraph, id: &str, contract: &str, paid: f64, due: NaiveDate, status: &str) {
        graph.add_node(Node::transaction(
            id,
            TransactionAttrs {
                amount: 1_000_000.0,
                paid_amount: paid,
                date: Some(date(1, 10)),
                due_date: Some(due),
                contract_no: Some(format!("NO-{}", contract)),
                status: Some(status.into()),
                ..Default::default()
            },
        ));
    }

    /// G buys steel from S under K1, which is overdue. S trades with R, which
    /// holds K2 on the same subject. K3 is steel between unrelated parties
    /// and K4 is cement between S and G.
    fn supply_chain() -> RiskGraph {
        let mut graph = RiskGraph::new();
        for id in ["G", "S", "R", "U", "V"] {
            company(&mut graph, id);
        }
        graph.add_edge("S", "R", EdgeType::TradesWith, None);
        contract(&mut graph, "K1", "Steel purchase - S Ltd", 4_000_000.0, "G", "S");
        contract(&mut graph, "K2", "Steel purchase - R Ltd", 2_000_000.0, "G", "R");
        contract(&mut graph, "K3", "Steel purchase - V Ltd", 9_000_000.0, "U", "V");
        contract(&mut graph, "K4", "Cement supply - S Ltd", 1_000_000.0, "G", "S");

        txn(&mut graph, "T1", "K1", 400_000.0, date(3, 1), "A");
        txn(&mut graph, "T2", "K4", 1_000_000.0, date(12, 1), "A");
        txn(&mut graph, "T3", "K4", 0.0, date(1, 1), "C");
        graph
    }

    #[test]
    fn test_contract_subject() {
        assert_eq!(contract_subject("Steel purchase - S Ltd"), "Steel purchase");
        assert_eq!(contract_subject("Steel"), "Steel");
        assert_eq!(contract_subject(" - S Ltd"), "");
        assert_eq!(contract_subject(""), "");
    }

    #[test]
    fn test_overdue_detection() {
        let graph = supply_chain();
        let config = PerformRiskConfig::default();
        let overdue = overdue_transactions(&graph, &config, date(5, 31), None, None);

        // T2 is not yet due and T3 is completed
        assert_eq!(overdue.len(), 2);
        assert!(overdue.iter().all(|o| o.transaction_id == "T1"));
        let mut parties: Vec<&str> = overdue.iter().map(|o| o.company_id.as_str()).collect();
        parties.sort();
        assert_eq!(parties, vec!["G", "S"]);
        assert_eq!(overdue[0].overdue_days, 91);
        assert_eq!(overdue[0].kind, OverdueKind::PaymentAndDelivery);
        assert_eq!(overdue[0].contract_id, "K1");

        let on_due = overdue_transactions(&graph, &config, date(3, 1), None, None);
        assert!(on_due.is_empty());
    }

    #[test]
    fn test_fully_paid_is_delivery_overdue() {
        let mut graph = supply_chain();
        txn(&mut graph, "T4", "K2", 1_000_000.0, date(2, 1), "A");
        let overdue =
            overdue_transactions(&graph, &PerformRiskConfig::default(), date(5, 31), None, None);
        let t4: Vec<_> = overdue.iter().filter(|o| o.transaction_id == "T4").collect();
        assert_eq!(t4.len(), 2);
        assert!(t4.iter().all(|o| o.kind == OverdueKind::Delivery));
    }

    #[test]
    fn test_filters() {
        let graph = supply_chain();
        let config = PerformRiskConfig::default();
        let only_s = HashSet::from(["S"]);
        let overdue = overdue_transactions(&graph, &config, date(5, 31), Some(&only_s), None);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].company_id, "S");

        let february = DateWindow::between(date(2, 1), date(2, 29));
        assert!(overdue_transactions(&graph, &config, date(5, 31), None, Some(&february)).is_empty());
    }

    #[test]
    fn test_risk_contracts_follow_partners() {
        let graph = supply_chain();
        let overdue =
            overdue_transactions(&graph, &PerformRiskConfig::default(), date(5, 31), None, None);
        let contracts = risk_contracts(&graph, &overdue);

        assert_eq!(contracts.keys().collect::<Vec<_>>(), vec!["G", "R", "S"]);
        let g: Vec<&str> = contracts["G"].iter().map(|c| c.contract_id.as_str()).collect();
        assert_eq!(g, vec!["K1", "K2"]);
        assert_eq!(contracts["R"].len(), 1);
        assert!(!contracts["R"][0].has_overdue);
        assert_eq!(contracts["R"][0].subject, "Steel purchase");
        assert!(contracts["S"][0].has_overdue);
    }

    #[test]
    fn test_perform_score() {
        let config = PerformRiskConfig::default();
        let record = OverdueTransaction {
            transaction_id: "T".into(),
            contract_no: "N".into(),
            contract_id: "K".into(),
            contract_name: "Steel".into(),
            company_id: "C".into(),
            company_name: "C".into(),
            amount: 1.0,
            paid_amount: 0.0,
            due_date: date(1, 1),
            overdue_days: 365,
            kind: OverdueKind::PaymentAndDelivery,
        };
        let contract = RiskContract {
            contract_id: "K".into(),
            contract_no: None,
            name: "Steel".into(),
            amount: 5_000_000.0,
            status: None,
            has_overdue: true,
            subject: "Steel".into(),
        };

        // 0.15 * 1.5 + 0.3 + 0.5 * 0.2
        assert_close(perform_score(&[&record], &[contract.clone()], &config), 0.625);

        let many = vec![&record; 5];
        let big = RiskContract {
            amount: 50_000_000.0,
            ..contract.clone()
        };
        assert_eq!(perform_score(&many, &[big], &config), 1.0);
        assert_eq!(perform_score(&[], &[], &config), 0.0);
    }

    #[test]
    fn test_compute_ranks_companies() {
        let graph = supply_chain();
        let report = PerformRiskAnalysis::compute(
            &graph,
            &PerformRiskConfig::default(),
            date(5, 31),
            None,
            None,
        )
        .unwrap();

        // S: its only risk contract is overdue; G also holds R's contract
        let order: Vec<&str> = report.companies.iter().map(|c| c.company_id.as_str()).collect();
        assert_eq!(order, vec!["S", "G", "R"]);

        let g = &report.companies[1];
        assert_eq!(g.overdue_count, 1);
        assert_eq!(g.risk_contracts.len(), 2);
        assert_eq!(g.credit_code.as_deref(), Some("CC-G"));

        let r = &report.companies[2];
        assert_eq!(r.overdue_count, 0);
        // 0.2 * 2M / 10M
        assert_close(r.score, 0.04);
        assert!(report.companies.iter().all(|c| c.score <= 1.0));
    }

    #[test]
    fn test_compute_top_n_and_company_filter() {
        let graph = supply_chain();
        let config = PerformRiskConfig {
            top_n: 1,
            ..Default::default()
        };
        let report = PerformRiskAnalysis::compute(&graph, &config, date(5, 31), None, None).unwrap();
        assert_eq!(report.companies.len(), 1);
        assert_eq!(report.companies[0].company_id, "S");

        let only = vec!["R".to_string()];
        let report = PerformRiskAnalysis::compute(
            &graph,
            &PerformRiskConfig::default(),
            date(5, 31),
            Some(&only),
            None,
        )
        .unwrap();
        assert!(report.overdue.is_empty());
        assert!(report.companies.is_empty());
    }

    #[tokio::test]
    async fn test_execute() {
        let analysis = PerformRiskAnalysis::new();
        assert_eq!(analysis.metadata().domain, Domain::Performance);

        let input = PerformRiskInput::new(Arc::new(supply_chain()), date(5, 31));
        let output = analysis.execute(input).await.unwrap();
        assert_eq!(output.report.overdue.len(), 2);
        assert_eq!(output.report.companies.len(), 3);
    }
}
