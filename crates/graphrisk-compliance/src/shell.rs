//! Shell entity clustering.
//!
//! Companies are merged into clusters when they share a legal representative,
//! a representative's phone number, a cross-employed person or a CONTROLS
//! edge. Each cluster is then scored on size, contract exposure, controller
//! concealment, internal trade and external risk records.

use crate::messages::{ShellClusterInput, ShellClusterOutput};
use crate::relations::{is_company_like, legal_representatives, multi_company_persons};
use async_trait::async_trait;
use graphrisk_core::{
    analysis::AnalysisMetadata,
    config::ShellClusterConfig,
    domain::{Domain, RiskLevel},
    error::Result,
    stats::{clamp_unit, normalize},
    traits::{Analysis, BatchAnalysis},
};
use graphrisk_graph::graph::RiskGraph;
use graphrisk_graph::types::{EdgeType, NodeIdx};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

// ============================================================================
// Union-Find
// ============================================================================

/// Disjoint sets over string ids.
///
/// Entries live in an arena addressed by handle; ids map to handles. Uses
/// path compression and union by rank.
#[derive(Debug, Clone, Default)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u32>,
    ids: Vec<String>,
    handles: HashMap<String, usize>,
}

impl UnionFind {
    /// Create an empty structure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of `id`, adding it as a singleton if unseen.
    pub fn handle(&mut self, id: &str) -> usize {
        if let Some(&h) = self.handles.get(id) {
            return h;
        }
        let h = self.parent.len();
        self.parent.push(h);
        self.rank.push(0);
        self.ids.push(id.to_string());
        self.handles.insert(id.to_string(), h);
        h
    }

    /// Root handle of the set containing `handle`.
    pub fn find(&mut self, handle: usize) -> usize {
        let mut root = handle;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = handle;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Merge the sets of two ids.
    pub fn union(&mut self, a: &str, b: &str) {
        let ha = self.handle(a);
        let hb = self.handle(b);
        let ra = self.find(ha);
        let rb = self.find(hb);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    /// Whether two ids are in the same set. Unknown ids are in no set.
    pub fn connected(&mut self, a: &str, b: &str) -> bool {
        match (self.handles.get(a).copied(), self.handles.get(b).copied()) {
            (Some(ha), Some(hb)) => self.find(ha) == self.find(hb),
            _ => false,
        }
    }

    /// Number of ids added.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Check if nothing was added.
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// All sets, ordered by their first-added member, members in insertion order.
    pub fn clusters(&mut self) -> Vec<Vec<String>> {
        let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
        let mut clusters: Vec<Vec<String>> = Vec::new();
        for h in 0..self.parent.len() {
            let root = self.find(h);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                clusters.push(Vec::new());
                clusters.len() - 1
            });
            clusters[slot].push(self.ids[h].clone());
        }
        clusters
    }
}

// ============================================================================
// Cluster Types
// ============================================================================

/// Dimension on which two companies were merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Same legal representative.
    LegalPerson,
    /// Representatives share a phone number.
    Phone,
    /// A person employed by both.
    Employment,
    /// One controls the other.
    Controls,
}

/// How a controller is tied to the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerRole {
    /// Legal representative of at least one member.
    LegalRepresentative,
    /// Employed by at least two members.
    CrossEmployed,
}

/// A person controlling cluster members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    /// Person id.
    pub person_id: String,
    /// Display name.
    pub name: String,
    /// Contact phone.
    pub phone: Option<String>,
    /// Tie to the cluster.
    pub role: ControllerRole,
    /// Members the person represents or works for.
    pub companies: Vec<String>,
}

/// Measured cluster features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterFeatures {
    /// Member count.
    pub company_count: usize,
    /// Distinct controllers.
    pub controller_count: usize,
    /// Sum of distinct contract amounts with a member as party.
    pub total_exposure: f64,
    /// Distinct contracts with a member as party.
    pub contract_count: usize,
    /// Amount of contracts with members on both sides.
    pub internal_trade_amount: f64,
    /// TRADES_WITH edges between members.
    pub internal_trade_count: usize,
    /// Administrative penalties across members.
    pub penalty_count: usize,
    /// Fine total across members.
    pub penalty_amount: f64,
    /// Business-abnormal listings across members.
    pub abnormal_count: usize,
}

/// A scored shell entity cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellCluster {
    /// `SHELL_001`, `SHELL_002`, ... in score order.
    pub cluster_id: String,
    /// Member ids.
    pub companies: Vec<String>,
    /// Member names.
    pub company_names: Vec<String>,
    /// Controlling persons.
    pub controllers: Vec<Controller>,
    /// Distinct controller phones.
    pub phones: Vec<String>,
    /// Dimensions that merged the members.
    pub link_types: Vec<LinkKind>,
    /// Measured features.
    pub features: ClusterFeatures,
    /// Score in [0, 1].
    pub risk_score: f64,
    /// Banded level.
    pub risk_level: RiskLevel,
}

// ============================================================================
// Scoring
// ============================================================================

/// Score for cluster size alone.
pub fn size_score(company_count: usize) -> f64 {
    match company_count {
        n if n >= 5 => 0.25,
        n if n >= 3 => 0.15,
        2 => 0.08,
        _ => 0.0,
    }
}

/// `1 - controllers / companies`, bounded to [0, 1].
pub fn concealment(controller_count: usize, company_count: usize) -> f64 {
    if company_count == 0 {
        return 0.0;
    }
    clamp_unit(1.0 - controller_count as f64 / company_count as f64)
}

/// Weighted cluster score, capped at 1.
pub fn shell_score(features: &ClusterFeatures, config: &ShellClusterConfig) -> f64 {
    let w = &config.weights;
    let mut score = size_score(features.company_count);
    score += w.exposure * normalize(features.total_exposure, config.exposure_threshold);
    score += w.concealment * concealment(features.controller_count, features.company_count);
    if features.total_exposure > 0.0 {
        score += w.internal_trade
            * clamp_unit(features.internal_trade_amount / features.total_exposure);
    }
    if features.penalty_count > 0 {
        score += w.penalty_bonus;
    }
    if features.abnormal_count > 0 {
        score += w.abnormal_bonus;
    }
    score.min(1.0)
}

fn risk_level(score: f64, config: &ShellClusterConfig) -> RiskLevel {
    if score >= config.high_threshold {
        RiskLevel::High
    } else if score >= config.medium_threshold {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

// ============================================================================
// Relation Graph
// ============================================================================

type PairLinks = HashMap<(NodeIdx, NodeIdx), BTreeSet<LinkKind>>;

fn pair(a: NodeIdx, b: NodeIdx) -> (NodeIdx, NodeIdx) {
    (a.min(b), a.max(b))
}

fn link_all(
    graph: &RiskGraph,
    uf: &mut UnionFind,
    links: &mut PairLinks,
    group: &[NodeIdx],
    kind: LinkKind,
) {
    for (i, &a) in group.iter().enumerate() {
        for &b in &group[i + 1..] {
            uf.union(graph.id(a), graph.id(b));
            links.entry(pair(a, b)).or_default().insert(kind);
        }
    }
}

/// Merge companies on the four relation dimensions.
fn build_relations(graph: &RiskGraph) -> (UnionFind, PairLinks) {
    let mut uf = UnionFind::new();
    let mut links = PairLinks::new();

    for (_, companies) in multi_company_persons(graph, EdgeType::LegalPerson) {
        link_all(graph, &mut uf, &mut links, &companies, LinkKind::LegalPerson);
    }

    let mut by_phone: BTreeMap<&str, Vec<NodeIdx>> = BTreeMap::new();
    for edge in graph.edges_of_type(EdgeType::LegalPerson) {
        let phone = graph
            .node(edge.from)
            .as_person()
            .and_then(|p| p.phone.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if let Some(phone) = phone {
            if is_company_like(graph, edge.to) {
                let group = by_phone.entry(phone).or_default();
                if !group.contains(&edge.to) {
                    group.push(edge.to);
                }
            }
        }
    }
    for companies in by_phone.values().filter(|g| g.len() >= 2) {
        link_all(graph, &mut uf, &mut links, companies, LinkKind::Phone);
    }

    for (_, companies) in multi_company_persons(graph, EdgeType::EmployedBy) {
        link_all(graph, &mut uf, &mut links, &companies, LinkKind::Employment);
    }

    for edge in graph.edges_of_type(EdgeType::Controls) {
        let companies = [edge.from, edge.to];
        if edge.from != edge.to && companies.iter().all(|&c| is_company_like(graph, c)) {
            link_all(graph, &mut uf, &mut links, &companies, LinkKind::Controls);
        }
    }

    (uf, links)
}

// ============================================================================
// Cluster Measurement
// ============================================================================

fn controllers(graph: &RiskGraph, members: &[NodeIdx]) -> Vec<Controller> {
    let mut order: Vec<NodeIdx> = Vec::new();
    let mut found: HashMap<NodeIdx, Controller> = HashMap::new();

    let mut add = |person: NodeIdx, company: NodeIdx, role: ControllerRole| {
        let entry = found.entry(person).or_insert_with(|| {
            order.push(person);
            let node = graph.node(person);
            Controller {
                person_id: node.id.clone(),
                name: node.label().to_string(),
                phone: node.as_person().and_then(|p| p.phone.clone()),
                role,
                companies: Vec::new(),
            }
        });
        let company = graph.id(company).to_string();
        if !entry.companies.contains(&company) {
            entry.companies.push(company);
        }
    };

    for &member in members {
        for person in legal_representatives(graph, member) {
            add(person, member, ControllerRole::LegalRepresentative);
        }
    }

    let mut employers: BTreeMap<NodeIdx, Vec<NodeIdx>> = BTreeMap::new();
    for &member in members {
        for edge in graph.in_edges_of_type(member, EdgeType::EmployedBy) {
            let list = employers.entry(edge.from).or_default();
            if !list.contains(&member) {
                list.push(member);
            }
        }
    }
    for (person, companies) in employers.into_iter().filter(|(_, c)| c.len() >= 2) {
        for company in companies {
            add(person, company, ControllerRole::CrossEmployed);
        }
    }

    order
        .into_iter()
        .filter_map(|p| found.remove(&p))
        .collect()
}

fn measure(graph: &RiskGraph, members: &[NodeIdx], controller_count: usize) -> ClusterFeatures {
    let member_set: HashSet<NodeIdx> = members.iter().copied().collect();
    let mut features = ClusterFeatures {
        company_count: members.len(),
        controller_count,
        ..Default::default()
    };

    let mut contracts: Vec<NodeIdx> = Vec::new();
    for &member in members {
        for edge in graph.out_edges(member).iter().map(|&e| graph.edge(e)) {
            if edge.edge_type.is_party() && !contracts.contains(&edge.to) {
                contracts.push(edge.to);
            }
        }
    }

    let amount_of = |c: NodeIdx| graph.node(c).as_contract().map_or(0.0, |k| k.amount);
    for &contract in &contracts {
        let amount = amount_of(contract);
        features.total_exposure += amount;

        let has_side = |side: EdgeType| {
            graph
                .in_edges_of_type(contract, side)
                .any(|e| member_set.contains(&e.from))
        };
        if has_side(EdgeType::PartyA) && has_side(EdgeType::PartyB) {
            features.internal_trade_amount += amount;
        }
    }
    features.contract_count = contracts.len();

    features.internal_trade_count = members
        .iter()
        .flat_map(|&m| graph.out_edges_of_type(m, EdgeType::TradesWith))
        .filter(|e| member_set.contains(&e.to))
        .count();

    for company in members.iter().filter_map(|&m| graph.node(m).as_company()) {
        features.penalty_count += company.penalties.len();
        features.penalty_amount += company.penalties.iter().map(|p| p.amount).sum::<f64>();
        features.abnormal_count += company.abnormal_records.len();
    }

    features
}

// ============================================================================
// Shell Cluster Detector
// ============================================================================

/// Shell entity cluster detector.
#[derive(Debug, Clone)]
pub struct ShellClusterDetector {
    metadata: AnalysisMetadata,
}

impl ShellClusterDetector {
    /// Create a new shell cluster detector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: AnalysisMetadata::batch(
                "compliance/shell-clusters",
                Domain::EntityClustering,
            )
            .with_description("Multi-dimensional company clustering with shell entity scoring"),
        }
    }

    /// Cluster companies and score each cluster, highest risk first.
    pub fn compute(graph: &RiskGraph, config: &ShellClusterConfig) -> Result<Vec<ShellCluster>> {
        config.validate()?;

        let (mut uf, links) = build_relations(graph);
        let mut clusters = Vec::new();

        for ids in uf.clusters() {
            if ids.len() < config.min_cluster_size {
                continue;
            }
            let members: Vec<NodeIdx> = ids.iter().filter_map(|id| graph.index_of(id)).collect();

            if config.exclude_internal
                && members
                    .iter()
                    .all(|&m| graph.node(m).as_company().is_some_and(|c| c.internal))
            {
                debug!(first = %ids[0], "skipping internal cluster");
                continue;
            }

            let member_set: HashSet<NodeIdx> = members.iter().copied().collect();
            let controllers = controllers(graph, &members);
            let features = measure(graph, &members, controllers.len());
            let risk_score = shell_score(&features, config);

            let link_types: BTreeSet<LinkKind> = links
                .iter()
                .filter(|((a, b), _)| member_set.contains(a) && member_set.contains(b))
                .flat_map(|(_, kinds)| kinds.iter().copied())
                .collect();
            let phones: BTreeSet<String> = controllers
                .iter()
                .filter_map(|c| c.phone.as_deref().map(str::trim))
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();

            clusters.push(ShellCluster {
                cluster_id: String::new(),
                company_names: members
                    .iter()
                    .map(|&m| graph.node(m).label().to_string())
                    .collect(),
                companies: ids,
                controllers,
                phones: phones.into_iter().collect(),
                link_types: link_types.into_iter().collect(),
                features,
                risk_score,
                risk_level: risk_level(risk_score, config),
            });
        }

        clusters.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
        for (i, cluster) in clusters.iter_mut().enumerate() {
            cluster.cluster_id = format!("SHELL_{:03}", i + 1);
        }
        Ok(clusters)
    }
}

impl Default for ShellClusterDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis for ShellClusterDetector {
    fn metadata(&self) -> &AnalysisMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchAnalysis<ShellClusterInput, ShellClusterOutput> for ShellClusterDetector {
    async fn execute(&self, input: ShellClusterInput) -> Result<ShellClusterOutput> {
        let start = Instant::now();
        let clusters = Self::compute(&input.graph, &input.config)?;
        let compute_time_us = start.elapsed().as_micros() as u64;

        info!(
            clusters = clusters.len(),
            high = clusters.iter().filter(|c| c.risk_level == RiskLevel::High).count(),
            compute_time_us,
            "shell cluster detection finished"
        );
        Ok(ShellClusterOutput {
            clusters,
            compute_time_us,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphrisk_graph::types::{AdminPenalty, CompanyAttrs, ContractAttrs, Node, PersonAttrs};
    use std::sync::Arc;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn person(graph: &mut RiskGraph, id: &str, phone: Option<&str>) {
        graph.add_node(Node::person(
            id,
            PersonAttrs {
                name: id.to_lowercase(),
                phone: phone.map(str::to_string),
            },
        ));
    }

    fn company(graph: &mut RiskGraph, id: &str, internal: bool) {
        graph.add_node(Node::company(
            id,
            CompanyAttrs {
                name: format!("{} Ltd", id),
                internal,
                ..Default::default()
            },
        ));
    }

    fn contract(graph: &mut RiskGraph, id: &str, amount: f64, a: &str, b: &str) {
        graph.add_node(Node::contract(
            id,
            ContractAttrs {
                amount,
                ..Default::default()
            },
        ));
        graph.add_edge(a, id, EdgeType::PartyA, None);
        graph.add_edge(b, id, EdgeType::PartyB, None);
    }

    /// A and B share representative P1; C's representative P2 shares P1's
    /// phone. D controls E. F stands alone.
    fn holding() -> RiskGraph {
        let mut graph = RiskGraph::new();
        for id in ["A", "B", "C", "D", "E", "F"] {
            company(&mut graph, id, false);
        }
        person(&mut graph, "P1", Some("111"));
        person(&mut graph, "P2", Some(" 111 "));
        graph.add_edge("P1", "A", EdgeType::LegalPerson, None);
        graph.add_edge("P1", "B", EdgeType::LegalPerson, None);
        graph.add_edge("P2", "C", EdgeType::LegalPerson, None);
        graph.add_edge("D", "E", EdgeType::Controls, None);
        contract(&mut graph, "K1", 6_000_000.0, "A", "B");
        contract(&mut graph, "K2", 4_000_000.0, "C", "X");
        graph.add_edge("A", "B", EdgeType::TradesWith, None);
        graph
    }

    #[test]
    fn test_union_find_transitive_any_order() {
        for pairs in [
            [("A", "B"), ("B", "C")],
            [("B", "C"), ("A", "B")],
            [("C", "B"), ("B", "A")],
        ] {
            let mut uf = UnionFind::new();
            for (a, b) in pairs {
                uf.union(a, b);
            }
            assert!(uf.connected("A", "C"));
            let clusters = uf.clusters();
            assert_eq!(clusters.len(), 1);
            let mut members = clusters[0].clone();
            members.sort();
            assert_eq!(members, vec!["A", "B", "C"]);
        }
    }

    #[test]
    fn test_union_find_handles_and_order() {
        let mut uf = UnionFind::new();
        assert!(uf.is_empty());
        let x = uf.handle("X");
        assert_eq!(uf.handle("X"), x);
        uf.union("Y", "Z");
        uf.union("Z", "X");
        uf.handle("W");
        assert_eq!(uf.len(), 4);
        assert!(!uf.connected("W", "X"));
        assert!(!uf.connected("W", "unknown"));
        assert_eq!(
            uf.clusters(),
            vec![
                vec!["X".to_string(), "Y".to_string(), "Z".to_string()],
                vec!["W".to_string()],
            ]
        );
    }

    #[test]
    fn test_concealment_bounds() {
        assert_eq!(concealment(3, 3), 0.0);
        assert_eq!(concealment(5, 3), 0.0);
        assert!(concealment(1, 100) > 0.98);
        assert_eq!(concealment(0, 4), 1.0);
        assert_eq!(concealment(0, 0), 0.0);
    }

    #[test]
    fn test_score_is_capped() {
        let config = ShellClusterConfig::default();
        let features = ClusterFeatures {
            company_count: 6,
            controller_count: 0,
            total_exposure: 50_000_000.0,
            internal_trade_amount: 50_000_000.0,
            penalty_count: 1,
            abnormal_count: 1,
            ..Default::default()
        };
        assert_eq!(shell_score(&features, &config), 1.0);
        assert_eq!(size_score(1), 0.0);
        assert_eq!(size_score(2), 0.08);
        assert_eq!(size_score(4), 0.15);
    }

    #[test]
    fn test_clusters_scored_and_ordered() {
        let graph = holding();
        let clusters =
            ShellClusterDetector::compute(&graph, &ShellClusterConfig::default()).unwrap();
        assert_eq!(clusters.len(), 2);

        let abc = &clusters[0];
        assert_eq!(abc.cluster_id, "SHELL_001");
        assert_eq!(abc.companies, vec!["A", "B", "C"]);
        assert_eq!(abc.link_types, vec![LinkKind::LegalPerson, LinkKind::Phone]);
        assert_eq!(abc.features.controller_count, 2);
        assert_eq!(abc.features.contract_count, 2);
        assert_eq!(abc.features.total_exposure, 10_000_000.0);
        assert_eq!(abc.features.internal_trade_amount, 6_000_000.0);
        assert_eq!(abc.features.internal_trade_count, 1);
        assert_eq!(abc.phones, vec!["111".to_string()]);
        // 0.15 size + 0.30 exposure + 0.25 * (1 - 2/3) + 0.20 * 0.6
        assert_close(abc.risk_score, 0.15 + 0.3 + 0.25 / 3.0 + 0.12);
        assert_eq!(abc.risk_level, RiskLevel::High);

        let de = &clusters[1];
        assert_eq!(de.cluster_id, "SHELL_002");
        assert_eq!(de.link_types, vec![LinkKind::Controls]);
        assert_eq!(de.features.controller_count, 0);
        assert_close(de.risk_score, 0.08 + 0.25);
        assert_eq!(de.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_cross_employment_and_bonuses() {
        let mut graph = RiskGraph::new();
        graph.add_node(Node::company(
            "F",
            CompanyAttrs {
                name: "F Ltd".into(),
                penalties: vec![AdminPenalty {
                    amount: 20_000.0,
                    ..Default::default()
                }],
                ..Default::default()
            },
        ));
        company(&mut graph, "G", false);
        person(&mut graph, "Q", None);
        graph.add_edge("Q", "F", EdgeType::EmployedBy, None);
        graph.add_edge("Q", "G", EdgeType::EmployedBy, None);

        let clusters =
            ShellClusterDetector::compute(&graph, &ShellClusterConfig::default()).unwrap();
        assert_eq!(clusters.len(), 1);
        let fg = &clusters[0];
        assert_eq!(fg.link_types, vec![LinkKind::Employment]);
        assert_eq!(fg.controllers.len(), 1);
        assert_eq!(fg.controllers[0].role, ControllerRole::CrossEmployed);
        assert_eq!(fg.controllers[0].companies, vec!["F", "G"]);
        assert_eq!(fg.features.penalty_count, 1);
        assert_eq!(fg.features.penalty_amount, 20_000.0);
        // 0.08 size + 0.25 * 0.5 + 0.05 penalty
        assert_close(fg.risk_score, 0.08 + 0.125 + 0.05);
    }

    #[test]
    fn test_exclude_internal_and_min_size() {
        let mut graph = RiskGraph::new();
        company(&mut graph, "I1", true);
        company(&mut graph, "I2", true);
        graph.add_edge("I1", "I2", EdgeType::Controls, None);

        let default = ShellClusterConfig::default();
        assert!(ShellClusterDetector::compute(&graph, &default).unwrap().is_empty());

        let included = ShellClusterConfig {
            exclude_internal: false,
            ..Default::default()
        };
        let kept = ShellClusterDetector::compute(&graph, &included).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].companies, vec!["I1", "I2"]);

        // one outside member keeps the cluster
        company(&mut graph, "O", false);
        graph.add_edge("I2", "O", EdgeType::Controls, None);
        let mixed = ShellClusterDetector::compute(&graph, &default).unwrap();
        assert_eq!(mixed.len(), 1);
        assert_eq!(mixed[0].companies, vec!["I1", "I2", "O"]);

        let config = ShellClusterConfig {
            min_cluster_size: 4,
            exclude_internal: false,
            ..Default::default()
        };
        assert!(ShellClusterDetector::compute(&graph, &config).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_execute() {
        let detector = ShellClusterDetector::new();
        let output = detector
            .execute(ShellClusterInput::new(Arc::new(holding())))
            .await
            .unwrap();
        assert_eq!(output.clusters.len(), 2);
    }
}
