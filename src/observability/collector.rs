use super::NodeMetrics;
use crate::core::ScopedNode;
use crate::engine::Graph;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub node_id: String,
    pub messages_received: u64,
    pub messages_forwarded: u64,
    pub errors_count: u64,
}

/// Metrics of every node that exposes them, keyed by scoped path (`root/sub/node`)
#[derive(Clone, Default)]
pub struct MetricsCollector {
    metrics: BTreeMap<String, Arc<NodeMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the graph and register every node exposing metrics
    pub fn from_graph(graph: &Graph) -> Self {
        Self::from_nodes(&graph.nodes())
    }

    pub fn from_nodes(nodes: &[ScopedNode]) -> Self {
        let mut collector = Self::new();
        for scoped in nodes {
            if let Some(metrics) = scoped.node.metrics() {
                collector.register(scoped.path(), metrics);
            }
        }
        collector
    }

    pub fn register(&mut self, path: impl Into<String>, metrics: Arc<NodeMetrics>) {
        self.metrics.insert(path.into(), metrics);
    }

    pub fn get(&self, path: &str) -> Option<Arc<NodeMetrics>> {
        self.metrics.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<String, MetricsSnapshot> {
        self.metrics
            .iter()
            .map(|(path, metrics)| {
                (
                    path.clone(),
                    MetricsSnapshot {
                        node_id: metrics.node_id().to_string(),
                        messages_received: metrics.messages_received(),
                        messages_forwarded: metrics.messages_forwarded(),
                        errors_count: metrics.errors_count(),
                    },
                )
            })
            .collect()
    }

    pub fn report(&self) -> String {
        let snapshot = self.snapshot();

        if snapshot.is_empty() {
            return "No nodes registered".to_string();
        }

        let mut report = String::from("=== Graph Metrics ===\n");

        for (path, metrics) in snapshot.iter() {
            report.push_str(&format!(
                "\n[{}]\n  Received: {}\n  Forwarded: {}\n  Errors: {}\n",
                path, metrics.messages_received, metrics.messages_forwarded, metrics.errors_count
            ));
        }

        report
    }
}
