//! The structured event log: the data product the rest of the crate is
//! built to produce. A [`Recorder`] is an append-only sink plus a
//! post-hoc cost-center rollup; it is independent of the ambient `tracing`
//! side-channel emitted alongside it when the `instrument` feature is on.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Order,
    Inventory,
    ProductionStart,
    ProductionEnd,
    TransportStart,
    TransportEnd,
    Income,
    Return,
    DisassemblyStart,
    DisassemblyEnd,
    Disturbance,
}

impl EventKind {
    fn as_str(&self) -> &'static str {
        match self {
            EventKind::Order => "ORDER",
            EventKind::Inventory => "INVENTORY",
            EventKind::ProductionStart => "PRODUCTION_START",
            EventKind::ProductionEnd => "PRODUCTION_END",
            EventKind::TransportStart => "TRANSPORT_START",
            EventKind::TransportEnd => "TRANSPORT_END",
            EventKind::Income => "INCOME",
            EventKind::Return => "RETURN",
            EventKind::DisassemblyStart => "DISASSEMBLY_START",
            EventKind::DisassemblyEnd => "DISASSEMBLY_END",
            EventKind::Disturbance => "DISTURBANCE",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: f64,
    pub node: String,
    pub node_type: String,
    pub kind: Option<EventKind>,
    pub quantity: Option<f64>,
    pub material: Option<String>,
    pub peer: Option<String>,
    pub mode: Option<String>,
    pub cost: Option<f64>,
    pub costcenter: Option<String>,
    pub properties: BTreeMap<String, f64>,
    pub comment: Option<String>,
}

impl LogEntry {
    pub fn new(time: f64, node: impl Into<String>, node_type: impl Into<String>, kind: EventKind) -> Self {
        LogEntry {
            time,
            node: node.into(),
            node_type: node_type.into(),
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn quantity(mut self, q: f64) -> Self {
        self.quantity = Some(q);
        self
    }
    pub fn material(mut self, m: impl Into<String>) -> Self {
        self.material = Some(m.into());
        self
    }
    pub fn peer(mut self, p: impl Into<String>) -> Self {
        self.peer = Some(p.into());
        self
    }
    pub fn mode(mut self, m: impl Into<String>) -> Self {
        self.mode = Some(m.into());
        self
    }
    pub fn cost(mut self, c: f64) -> Self {
        self.cost = Some(c);
        self
    }
    pub fn costcenter(mut self, cc: impl Into<String>) -> Self {
        self.costcenter = Some(cc.into());
        self
    }
    pub fn properties(mut self, props: BTreeMap<String, f64>) -> Self {
        self.properties = props;
        self
    }
    pub fn comment(mut self, c: impl Into<String>) -> Self {
        self.comment = Some(c.into());
        self
    }

    pub fn date(&self, start_date: NaiveDate) -> NaiveDate {
        start_date + chrono::Duration::days(self.time.floor() as i64)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostCenterSummary {
    pub cost: f64,
    pub income: f64,
    pub properties: BTreeMap<String, f64>,
}

impl CostCenterSummary {
    pub fn profit(&self) -> f64 {
        self.income - self.cost
    }
}

/// Append-only structured log plus the derived cost-center KPI rollup.
#[derive(Debug, Default)]
pub struct Recorder {
    entries: Vec<LogEntry>,
    property_names: BTreeSet<String>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, entry: LogEntry) {
        for name in entry.properties.keys() {
            self.property_names.insert(name.clone());
        }
        emit_trace(&entry);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn property_names(&self) -> &BTreeSet<String> {
        &self.property_names
    }

    /// Per-cost-center KPI rollup, matching §3 invariant 6: `INCOME` accrues
    /// to `income`, any other entry with a non-null cost accrues to `cost`,
    /// and property values always sum regardless of whether cost is set.
    pub fn summary(&self) -> BTreeMap<String, CostCenterSummary> {
        let mut summary: BTreeMap<String, CostCenterSummary> = BTreeMap::new();
        for entry in &self.entries {
            let Some(costcenter) = &entry.costcenter else {
                continue;
            };
            if entry.cost.is_none() && entry.properties.is_empty() {
                continue;
            }
            let data = summary.entry(costcenter.clone()).or_default();
            if let Some(cost) = entry.cost {
                match entry.kind {
                    Some(EventKind::Income) => data.income += cost,
                    _ => data.cost += cost,
                }
            }
            for (name, value) in &entry.properties {
                *data.properties.entry(name.clone()).or_insert(0.0) += value;
            }
        }
        summary
    }
}

fn emit_trace(entry: &LogEntry) {
    #[cfg(feature = "instrument")]
    {
        let kind = entry.kind.map(|k| k.as_str()).unwrap_or("");
        tracing::info!(
            target: "sim.log",
            time = entry.time,
            node = %entry.node,
            node_type = %entry.node_type,
            event = kind,
            quantity = entry.quantity.unwrap_or_default(),
            material = entry.material.as_deref().unwrap_or_default(),
            peer = entry.peer.as_deref().unwrap_or_default(),
            mode = entry.mode.as_deref().unwrap_or_default(),
            cost = entry.cost.unwrap_or_default(),
            costcenter = entry.costcenter.as_deref().unwrap_or_default(),
            comment = entry.comment.as_deref().unwrap_or_default(),
        );
    }
    #[cfg(not(feature = "instrument"))]
    let _ = entry;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn income_accrues_separately_from_cost() {
        let mut r = Recorder::new();
        r.log(
            LogEntry::new(0.0, "dc1", "DistributionCenter", EventKind::Income)
                .cost(120.0)
                .costcenter("dc1"),
        );
        r.log(
            LogEntry::new(1.0, "dc1", "DistributionCenter", EventKind::TransportEnd)
                .cost(15.0)
                .costcenter("dc1"),
        );
        let summary = r.summary();
        let dc1 = &summary["dc1"];
        assert_eq!(dc1.income, 120.0);
        assert_eq!(dc1.cost, 15.0);
        assert_eq!(dc1.profit(), 105.0);
    }

    #[test]
    fn properties_sum_even_without_cost() {
        let mut r = Recorder::new();
        let mut props = BTreeMap::new();
        props.insert("emission".to_string(), 3.0);
        r.log(
            LogEntry::new(0.0, "p1", "ProductionSite", EventKind::ProductionEnd)
                .costcenter("p1")
                .properties(props),
        );
        let summary = r.summary();
        assert_eq!(summary["p1"].properties["emission"], 3.0);
        assert_eq!(summary["p1"].cost, 0.0);
    }

    #[test]
    fn entries_without_costcenter_are_excluded_from_summary() {
        let mut r = Recorder::new();
        r.log(LogEntry::new(0.0, "c1", "Customer", EventKind::Order).comment("Lost sale"));
        assert!(r.summary().is_empty());
    }
}
