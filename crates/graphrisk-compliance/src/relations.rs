//! Company relations shared by the detectors.

use graphrisk_graph::graph::RiskGraph;
use graphrisk_graph::types::{EdgeType, NodeIdx, NodeKind};
use std::collections::{HashSet, VecDeque};

/// Companies and stubs standing in for them.
pub fn is_company_like(graph: &RiskGraph, idx: NodeIdx) -> bool {
    matches!(graph.node(idx).kind, NodeKind::Company(_) | NodeKind::Stub)
}

/// Distinct targets of a person's outgoing edges of one type, in edge order.
pub fn targets_of(graph: &RiskGraph, person: NodeIdx, edge_type: EdgeType) -> Vec<NodeIdx> {
    let mut seen = HashSet::new();
    graph
        .out_edges_of_type(person, edge_type)
        .map(|e| e.to)
        .filter(|to| seen.insert(*to))
        .collect()
}

/// Distinct legal representatives of a company.
pub fn legal_representatives(graph: &RiskGraph, company: NodeIdx) -> Vec<NodeIdx> {
    let mut seen = HashSet::new();
    graph
        .in_edges_of_type(company, EdgeType::LegalPerson)
        .map(|e| e.from)
        .filter(|p| seen.insert(*p))
        .collect()
}

/// Persons with edges of `edge_type` to at least two companies, with those companies.
pub fn multi_company_persons(graph: &RiskGraph, edge_type: EdgeType) -> Vec<(NodeIdx, Vec<NodeIdx>)> {
    (0..graph.node_count())
        .filter_map(|person| {
            let companies: Vec<NodeIdx> = targets_of(graph, person, edge_type)
                .into_iter()
                .filter(|&c| is_company_like(graph, c))
                .collect();
            (companies.len() >= 2).then_some((person, companies))
        })
        .collect()
}

/// Companies joined by CONTROLS edges in either direction.
pub fn control_neighbors(graph: &RiskGraph, company: NodeIdx) -> impl Iterator<Item = NodeIdx> + '_ {
    graph
        .out_edges_of_type(company, EdgeType::Controls)
        .map(|e| e.to)
        .chain(
            graph
                .in_edges_of_type(company, EdgeType::Controls)
                .map(|e| e.from),
        )
}

/// Display name of a company's legal representative: the registered name,
/// else the label of the first LEGAL_PERSON source.
pub fn legal_person_name(graph: &RiskGraph, company: NodeIdx) -> Option<String> {
    graph
        .node(company)
        .as_company()
        .and_then(|a| a.legal_person.clone())
        .or_else(|| {
            graph
                .in_edges_of_type(company, EdgeType::LegalPerson)
                .next()
                .map(|e| graph.node(e.from).label().to_string())
        })
}

/// Distinct company-like neighbours over trading and control edges, either direction.
pub fn business_partners(graph: &RiskGraph, company: NodeIdx) -> Vec<NodeIdx> {
    const BUSINESS: [EdgeType; 4] = [
        EdgeType::TradesWith,
        EdgeType::IsSupplier,
        EdgeType::IsCustomer,
        EdgeType::Controls,
    ];
    let mut seen = HashSet::from([company]);
    let mut partners = Vec::new();
    for edge_type in BUSINESS {
        let neighbours = graph
            .out_edges_of_type(company, edge_type)
            .map(|e| e.to)
            .chain(graph.in_edges_of_type(company, edge_type).map(|e| e.from));
        for next in neighbours {
            if is_company_like(graph, next) && seen.insert(next) {
                partners.push(next);
            }
        }
    }
    partners
}

/// Distinct contracts a company is party to, either side.
pub fn party_contracts(graph: &RiskGraph, company: NodeIdx) -> Vec<NodeIdx> {
    let mut seen = HashSet::new();
    graph
        .out_edges(company)
        .iter()
        .map(|&e| graph.edge(e))
        .filter(|e| e.edge_type.is_party())
        .map(|e| e.to)
        .filter(|c| seen.insert(*c))
        .collect()
}

/// The company, companies sharing one of its legal representatives, and
/// companies within `control_hops` undirected CONTROLS hops.
pub fn related_companies(graph: &RiskGraph, company: NodeIdx, control_hops: usize) -> HashSet<NodeIdx> {
    let mut related = HashSet::from([company]);

    for person in legal_representatives(graph, company) {
        related.extend(targets_of(graph, person, EdgeType::LegalPerson));
    }

    let mut seen = HashSet::from([company]);
    let mut queue = VecDeque::from([(company, 0usize)]);
    while let Some((current, depth)) = queue.pop_front() {
        if depth == control_hops {
            continue;
        }
        for next in control_neighbors(graph, current) {
            if seen.insert(next) {
                related.insert(next);
                queue.push_back((next, depth + 1));
            }
        }
    }
    related
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> RiskGraph {
        let mut graph = RiskGraph::new();
        graph.add_edge("P", "A", EdgeType::LegalPerson, None);
        graph.add_edge("P", "B", EdgeType::LegalPerson, None);
        graph.add_edge("P", "B", EdgeType::LegalPerson, None);
        graph.add_edge("A", "C", EdgeType::Controls, None);
        graph.add_edge("D", "C", EdgeType::Controls, None);
        graph.add_edge("D", "E", EdgeType::Controls, None);
        graph
    }

    fn ids(graph: &RiskGraph, set: &HashSet<NodeIdx>) -> Vec<String> {
        let mut ids: Vec<String> = set.iter().map(|&i| graph.id(i).to_string()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_multi_company_persons_distinct() {
        let graph = group();
        let groups = multi_company_persons(&graph, EdgeType::LegalPerson);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn test_related_companies_hops() {
        let graph = group();
        let a = graph.index_of("A").unwrap();

        let one = related_companies(&graph, a, 1);
        assert_eq!(ids(&graph, &one), vec!["A", "B", "C"]);

        let two = related_companies(&graph, a, 2);
        assert_eq!(ids(&graph, &two), vec!["A", "B", "C", "D"]);

        let none = related_companies(&graph, a, 0);
        assert_eq!(ids(&graph, &none), vec!["A", "B"]);
    }

    #[test]
    fn test_legal_person_name_prefers_registered() {
        use graphrisk_graph::types::{CompanyAttrs, Node};

        let mut graph = group();
        let a = graph.index_of("A").unwrap();
        assert_eq!(legal_person_name(&graph, a).as_deref(), Some("P"));

        graph.add_node(Node::company(
            "R",
            CompanyAttrs {
                legal_person: Some("Registered".into()),
                ..Default::default()
            },
        ));
        graph.add_edge("P", "R", EdgeType::LegalPerson, None);
        let r = graph.index_of("R").unwrap();
        assert_eq!(legal_person_name(&graph, r).as_deref(), Some("Registered"));

        let e = graph.index_of("E").unwrap();
        assert_eq!(legal_person_name(&graph, e), None);
    }

    #[test]
    fn test_business_partners_undirected() {
        let mut graph = group();
        graph.add_edge("A", "S", EdgeType::IsSupplier, None);
        graph.add_edge("T", "A", EdgeType::TradesWith, None);
        graph.add_edge("S", "A", EdgeType::IsCustomer, None);
        graph.add_edge("A", "A", EdgeType::TradesWith, None);
        let a = graph.index_of("A").unwrap();

        let mut partners: Vec<&str> = business_partners(&graph, a)
            .into_iter()
            .map(|i| graph.id(i))
            .collect();
        partners.sort();
        assert_eq!(partners, vec!["C", "S", "T"]);
    }

    #[test]
    fn test_party_contracts_distinct() {
        let mut graph = group();
        graph.add_edge("A", "K1", EdgeType::PartyA, None);
        graph.add_edge("A", "K1", EdgeType::PartyB, None);
        graph.add_edge("A", "K2", EdgeType::PartyB, None);
        let a = graph.index_of("A").unwrap();
        assert_eq!(party_contracts(&graph, a).len(), 2);
    }
}
