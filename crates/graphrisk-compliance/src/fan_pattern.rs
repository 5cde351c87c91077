//! Fan-out/fan-in detection.
//!
//! A central company disperses large payments to several receivers inside a
//! time window; the receivers trade among themselves and pay a similar total
//! back to the center or a company related to it.
//!
//! Money flows come from `payer -PAYS-> transaction -RECEIVES-> receiver`
//! chains and from TRADES_WITH edges carrying an amount. Windows are anchored
//! at each qualifying outflow date and the highest-risk window is kept per
//! center.

use crate::messages::{FanPatternInput, FanPatternOutput};
use crate::relations::related_companies;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use graphrisk_core::{
    analysis::AnalysisMetadata,
    cancel::CancellationToken,
    config::FanPatternConfig,
    domain::Domain,
    error::Result,
    stats::normalize,
    traits::{Analysis, BatchAnalysis},
};
use graphrisk_graph::graph::RiskGraph;
use graphrisk_graph::types::{Edge, EdgeType, NodeIdx};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::time::Instant;
use tracing::{debug, info};

// ============================================================================
// Money Flows
// ============================================================================

/// A payment from one node to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoneyFlow {
    /// Paying node.
    pub payer: NodeIdx,
    /// Receiving node.
    pub receiver: NodeIdx,
    /// Amount paid.
    pub amount: f64,
    /// Value date.
    pub date: Option<NaiveDate>,
    /// Transaction node, absent for direct trade edges.
    pub via: Option<NodeIdx>,
}

/// Serializable view of a [`MoneyFlow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    /// Paying node id.
    pub payer: String,
    /// Receiving node id.
    pub receiver: String,
    /// Amount paid.
    pub amount: f64,
    /// Value date.
    pub date: Option<NaiveDate>,
    /// Transaction id.
    pub transaction: Option<String>,
}

impl FlowRecord {
    fn from_flow(graph: &RiskGraph, flow: &MoneyFlow) -> Self {
        Self {
            payer: graph.id(flow.payer).to_string(),
            receiver: graph.id(flow.receiver).to_string(),
            amount: flow.amount,
            date: flow.date,
            transaction: flow.via.map(|t| graph.id(t).to_string()),
        }
    }
}

/// Amount and date of a payment: the transaction's own attributes first,
/// then the PAYS edge, then the RECEIVES edge.
fn payment_terms(
    graph: &RiskGraph,
    pays: &Edge,
    receives: &Edge,
) -> Option<(f64, Option<NaiveDate>)> {
    let attrs = graph.node(pays.to).as_transaction();
    let amount = attrs
        .map(|t| t.amount)
        .filter(|a| *a > 0.0)
        .or(pays.properties.amount)
        .or(receives.properties.amount)?;
    let date = attrs
        .and_then(|t| t.date)
        .or(pays.properties.date)
        .or(receives.properties.date);
    Some((amount, date))
}

/// Every money flow in the graph, in edge order.
pub fn money_flows(graph: &RiskGraph) -> Vec<MoneyFlow> {
    let mut flows = Vec::new();

    for pays in graph.edges_of_type(EdgeType::Pays) {
        for receives in graph.out_edges_of_type(pays.to, EdgeType::Receives) {
            let Some((amount, date)) = payment_terms(graph, pays, receives) else {
                continue;
            };
            flows.push(MoneyFlow {
                payer: pays.from,
                receiver: receives.to,
                amount,
                date,
                via: Some(pays.to),
            });
        }
    }

    for trade in graph.edges_of_type(EdgeType::TradesWith) {
        if let Some(amount) = trade.properties.amount {
            flows.push(MoneyFlow {
                payer: trade.from,
                receiver: trade.to,
                amount,
                date: trade.properties.date,
                via: None,
            });
        }
    }

    flows
}

// ============================================================================
// Patterns
// ============================================================================

/// A dispersal and return of funds around one center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPattern {
    /// Central company.
    pub center: String,
    /// Receivers of the large outflows.
    pub dispersed: Vec<String>,
    /// Related companies the funds came back to.
    pub convergence: Vec<String>,
    /// Everything counted as related to the center.
    pub related: Vec<String>,
    /// Sum of qualifying outflows in the window.
    pub total_outflow: f64,
    /// Sum of returning inflows in the window.
    pub total_inflow: f64,
    /// `min(in, out) / max(in, out)`.
    pub similarity: f64,
    /// Flows among dispersed nodes in the window.
    pub inter_trade_count: usize,
    /// Days from the window start to the last return.
    pub time_span_days: Option<i64>,
    /// Anchor date, absent for an unbounded window.
    pub window_start: Option<NaiveDate>,
    /// Weighted pattern score.
    pub risk_score: f64,
    /// Qualifying outflows.
    pub outflows: Vec<FlowRecord>,
    /// Returning inflows.
    pub inflows: Vec<FlowRecord>,
    /// Trades among dispersed nodes.
    pub inter_trades: Vec<FlowRecord>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl Window {
    const UNBOUNDED: Window = Window {
        start: None,
        end: None,
    };

    fn anchored(start: NaiveDate, days: u32) -> Self {
        Self {
            start: Some(start),
            end: Some(start + Duration::days(i64::from(days))),
        }
    }

    /// Undated flows only fall inside an unbounded window.
    fn admits(&self, date: Option<NaiveDate>) -> bool {
        match (self.start, self.end, date) {
            (None, None, _) => true,
            (_, _, None) => false,
            (start, end, Some(d)) => {
                start.map_or(true, |s| d >= s) && end.map_or(true, |e| d <= e)
            }
        }
    }
}

/// Windows to try for one center's qualifying outflows.
fn windows(outflows: &[&MoneyFlow], days: Option<u32>) -> Vec<Window> {
    match days {
        None => vec![Window::UNBOUNDED],
        Some(days) => outflows
            .iter()
            .filter_map(|f| f.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|anchor| Window::anchored(anchor, days))
            .collect(),
    }
}

fn distinct_in_order(ids: impl Iterator<Item = NodeIdx>) -> Vec<NodeIdx> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

fn ids(graph: &RiskGraph, nodes: &[NodeIdx]) -> Vec<String> {
    nodes.iter().map(|&n| graph.id(n).to_string()).collect()
}

fn records(graph: &RiskGraph, flows: &[&MoneyFlow]) -> Vec<FlowRecord> {
    flows.iter().map(|f| FlowRecord::from_flow(graph, f)).collect()
}

// ============================================================================
// Fan Pattern Detector
// ============================================================================

/// Fan-out/fan-in circular trade detector.
#[derive(Debug, Clone)]
pub struct FanPatternDetector {
    metadata: AnalysisMetadata,
}

impl FanPatternDetector {
    /// Create a new fan pattern detector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: AnalysisMetadata::batch("compliance/fan-pattern", Domain::CircularTrade)
                .with_description("Fan-out/fan-in money flow detection with sliding windows")
                .cancellable(),
        }
    }

    /// Find fan-out/fan-in patterns, highest risk first.
    pub fn compute(
        graph: &RiskGraph,
        config: &FanPatternConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<FlowPattern>> {
        config.validate()?;

        let flows = money_flows(graph);
        let centers: BTreeSet<NodeIdx> = flows.iter().map(|f| f.payer).collect();
        let mut patterns = Vec::new();

        for center in centers {
            cancel.check("fan pattern search")?;
            if let Some(pattern) = Self::best_window(graph, &flows, center, config) {
                patterns.push(pattern);
            }
        }

        patterns.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
        debug!(
            flows = flows.len(),
            patterns = patterns.len(),
            "fan pattern search complete"
        );
        Ok(patterns)
    }

    fn best_window(
        graph: &RiskGraph,
        flows: &[MoneyFlow],
        center: NodeIdx,
        config: &FanPatternConfig,
    ) -> Option<FlowPattern> {
        let qualifying: Vec<&MoneyFlow> = flows
            .iter()
            .filter(|f| f.payer == center && f.amount >= config.amount_threshold)
            .collect();
        if qualifying.len() < 2 {
            return None;
        }

        let related = related_companies(graph, center, config.related_control_hops);
        let mut best: Option<FlowPattern> = None;

        for window in windows(&qualifying, config.time_window_days) {
            let candidate =
                Self::evaluate(graph, flows, center, &qualifying, &related, window, config);
            let Some(pattern) = candidate else {
                continue;
            };
            if pattern.similarity < config.similarity_threshold {
                continue;
            }
            // Strictly better only, so ties keep the earliest window.
            if best.as_ref().map_or(true, |b| pattern.risk_score > b.risk_score) {
                best = Some(pattern);
            }
        }
        best
    }

    fn evaluate(
        graph: &RiskGraph,
        flows: &[MoneyFlow],
        center: NodeIdx,
        qualifying: &[&MoneyFlow],
        related: &HashSet<NodeIdx>,
        window: Window,
        config: &FanPatternConfig,
    ) -> Option<FlowPattern> {
        let outflows: Vec<&MoneyFlow> = qualifying
            .iter()
            .copied()
            .filter(|f| window.admits(f.date))
            .collect();
        if outflows.len() < 2 {
            return None;
        }

        let dispersed = distinct_in_order(outflows.iter().map(|f| f.receiver));
        if dispersed.len() < config.min_dispersed {
            return None;
        }
        let dispersed_set: HashSet<NodeIdx> = dispersed.iter().copied().collect();

        let in_window = || flows.iter().filter(move |f| window.admits(f.date));
        let inter_trades: Vec<&MoneyFlow> = in_window()
            .filter(|f| dispersed_set.contains(&f.payer) && dispersed_set.contains(&f.receiver))
            .collect();
        let inflows: Vec<&MoneyFlow> = in_window()
            .filter(|f| dispersed_set.contains(&f.payer) && related.contains(&f.receiver))
            .collect();
        if inflows.is_empty() {
            return None;
        }

        let total_outflow: f64 = outflows.iter().map(|f| f.amount).sum();
        let total_inflow: f64 = inflows.iter().map(|f| f.amount).sum();
        let largest = total_outflow.max(total_inflow);
        let similarity = if largest > 0.0 {
            total_outflow.min(total_inflow) / largest
        } else {
            0.0
        };

        let w = &config.weights;
        let risk_score = w.similarity * similarity
            + w.dispersion * normalize(dispersed.len() as f64, config.dispersion_normalizer)
            + w.relay * normalize(inter_trades.len() as f64, config.relay_normalizer);

        let start = window
            .start
            .or_else(|| outflows.iter().filter_map(|f| f.date).min());
        let last_return = inflows.iter().filter_map(|f| f.date).max();
        let time_span_days = start.zip(last_return).map(|(s, e)| (e - s).num_days());

        let mut related_sorted: Vec<NodeIdx> = related.iter().copied().collect();
        related_sorted.sort_unstable();

        Some(FlowPattern {
            center: graph.id(center).to_string(),
            dispersed: ids(graph, &dispersed),
            convergence: ids(graph, &distinct_in_order(inflows.iter().map(|f| f.receiver))),
            related: ids(graph, &related_sorted),
            total_outflow,
            total_inflow,
            similarity,
            inter_trade_count: inter_trades.len(),
            time_span_days,
            window_start: window.start,
            risk_score,
            outflows: records(graph, &outflows),
            inflows: records(graph, &inflows),
            inter_trades: records(graph, &inter_trades),
        })
    }
}

impl Default for FanPatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis for FanPatternDetector {
    fn metadata(&self) -> &AnalysisMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchAnalysis<FanPatternInput, FanPatternOutput> for FanPatternDetector {
    async fn execute(&self, input: FanPatternInput) -> Result<FanPatternOutput> {
        let start = Instant::now();
        let patterns = Self::compute(&input.graph, &input.config, &input.cancel)?;
        let compute_time_us = start.elapsed().as_micros() as u64;

        info!(
            patterns = patterns.len(),
            compute_time_us,
            "fan pattern detection finished"
        );
        Ok(FanPatternOutput {
            patterns,
            compute_time_us,
        })
    }
}
