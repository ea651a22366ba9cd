//! Read-only view of the engine's persisted knowledge graph.
//!
//! The engine owns `graph.json` in the shared working directory; this module
//! only ever reads it, best-effort — a missing or corrupt file is "no stats",
//! never an error. Used for the console's stats display, the one-line size
//! summary logged after engine initialisation, and the records export.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Graph file name within the working directory.
pub const GRAPH_FILENAME: &str = "graph.json";

/// Node kind value identifying ingested text chunks.
const CHUNK_KIND: &str = "chunk";

/// How many top-degree nodes the stats view lists.
const TOP_NODES: usize = 5;

// ── Persisted shape ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphFile {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Load the persisted graph from `work_dir`, best-effort.
pub fn load(work_dir: &Path) -> Option<GraphFile> {
    let path = work_dir.join(GRAPH_FILENAME);
    if !path.exists() {
        return None;
    }
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read graph file");
            return None;
        }
    };
    match serde_json::from_str(&data) {
        Ok(graph) => Some(graph),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed graph file");
            None
        }
    }
}

// ── Statistics ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub average_degree: f64,
    /// Undirected density: `2e / n(n-1)`, 0 for graphs with < 2 nodes.
    pub density: f64,
    /// Highest-degree nodes, degree-descending (id ties broken
    /// lexicographically for stable output).
    pub top_nodes: Vec<TopNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopNode {
    pub id: String,
    /// 12-hex-char short hash of the id, for compact display.
    pub short_hash: String,
    pub degree: usize,
}

impl GraphFile {
    /// Degree per node id, counting each edge at both endpoints.
    fn degrees(&self) -> HashMap<&str, usize> {
        let mut degrees: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
        for edge in &self.edges {
            if let Some(d) = degrees.get_mut(edge.source.as_str()) {
                *d += 1;
            }
            if let Some(d) = degrees.get_mut(edge.target.as_str()) {
                *d += 1;
            }
        }
        degrees
    }

    pub fn stats(&self) -> GraphStats {
        let n = self.nodes.len();
        let e = self.edges.len();

        let degrees = self.degrees();
        let average_degree = if n > 0 {
            degrees.values().sum::<usize>() as f64 / n as f64
        } else {
            0.0
        };
        let density = if n > 1 {
            2.0 * e as f64 / (n as f64 * (n as f64 - 1.0))
        } else {
            0.0
        };

        let mut ranked: Vec<(&str, usize)> = degrees.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let top_nodes = ranked
            .into_iter()
            .take(TOP_NODES)
            .map(|(id, degree)| TopNode {
                id: id.to_string(),
                short_hash: short_hash(id),
                degree,
            })
            .collect();

        GraphStats { nodes: n, edges: e, average_degree, density, top_nodes }
    }

    /// Chunk-type nodes rendered as exportable records: the chunk's content
    /// plus every incident edge as a relationship to the other endpoint.
    pub fn records(&self) -> Vec<Record> {
        self.nodes
            .iter()
            .filter(|node| node.kind == CHUNK_KIND)
            .map(|node| {
                let relationships = self
                    .edges
                    .iter()
                    .filter_map(|edge| {
                        let other = if edge.source == node.id {
                            &edge.target
                        } else if edge.target == node.id {
                            &edge.source
                        } else {
                            return None;
                        };
                        Some(Relationship {
                            target: other.clone(),
                            kind: edge.label.clone(),
                            weight: edge.weight,
                        })
                    })
                    .collect();
                Record {
                    id: node.id.clone(),
                    content: node.content.clone(),
                    metadata: RecordMeta {
                        kind: node.kind.clone(),
                        timestamp: node.timestamp.clone(),
                        relationships,
                    },
                }
            })
            .collect()
    }
}

/// First 12 hex chars of the SHA-256 of `id`.
pub fn short_hash(id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hex::encode(hasher.finalize())[..12].to_string()
}

// ── Export records ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub id: String,
    pub content: String,
    pub metadata: RecordMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordMeta {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Relationship {
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub weight: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> GraphFile {
        serde_json::from_str(
            r#"{
                "nodes": [
                    {"id": "c1", "kind": "chunk", "content": "alpha text", "timestamp": "2026-08-07T00:00:00Z"},
                    {"id": "e1", "kind": "entity"},
                    {"id": "e2", "kind": "entity"}
                ],
                "edges": [
                    {"source": "c1", "target": "e1", "label": "mentions", "weight": 0.5},
                    {"source": "e1", "target": "e2", "label": "relates_to"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn stats_counts_and_density() {
        let stats = sample().stats();
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.edges, 2);
        // degrees: c1=1, e1=2, e2=1 → avg 4/3
        assert!((stats.average_degree - 4.0 / 3.0).abs() < 1e-9);
        // 2*2 / (3*2) = 2/3
        assert!((stats.density - 2.0 / 3.0).abs() < 1e-9);

        let top = &stats.top_nodes[0];
        assert_eq!(top.id, "e1");
        assert_eq!(top.degree, 2);
        assert_eq!(top.short_hash.len(), 12);
    }

    #[test]
    fn empty_graph_stats_are_zero() {
        let stats = GraphFile::default().stats();
        assert_eq!(stats.nodes, 0);
        assert_eq!(stats.density, 0.0);
        assert!(stats.top_nodes.is_empty());
    }

    #[test]
    fn records_cover_chunk_nodes_only() {
        let records = sample().records();
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.id, "c1");
        assert_eq!(rec.content, "alpha text");
        assert_eq!(rec.metadata.kind, "chunk");
        assert_eq!(rec.metadata.relationships.len(), 1);
        assert_eq!(rec.metadata.relationships[0].target, "e1");
        assert!((rec.metadata.relationships[0].weight - 0.5).abs() < 1e-9);
    }

    #[test]
    fn default_edge_weight_is_one() {
        let graph = sample();
        assert!((graph.edges[1].weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn load_is_best_effort() {
        let tmp = TempDir::new().unwrap();
        assert!(load(tmp.path()).is_none(), "missing file is None");

        fs::write(tmp.path().join(GRAPH_FILENAME), "{not json").unwrap();
        assert!(load(tmp.path()).is_none(), "corrupt file is None");

        fs::write(tmp.path().join(GRAPH_FILENAME), r#"{"nodes": [], "edges": []}"#).unwrap();
        assert!(load(tmp.path()).is_some());
    }

    #[test]
    fn short_hash_is_stable() {
        assert_eq!(short_hash("node-a"), short_hash("node-a"));
        assert_ne!(short_hash("node-a"), short_hash("node-b"));
        assert_eq!(short_hash("node-a").len(), 12);
    }
}
