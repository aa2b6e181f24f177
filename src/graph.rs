use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::types::{Category, IndexEntry, NoteMeta};

/// Externally-produced note graph document:
/// `{"nodes": [{"id": "<path>"}], "links": [{"source": ..., "target": ...}]}`.
#[derive(Debug, Default, Deserialize)]
pub struct GraphDoc {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub links: Vec<GraphLink>,
}

#[derive(Debug, Deserialize)]
pub struct GraphNode {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GraphLink {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

/// Degree counts and undirected adjacency derived from the link list.
/// Link endpoints that never appear in the node list still count toward
/// degree — the node list only decides which paths can become targets.
#[derive(Debug, Default)]
pub struct LinkGraph {
    pub nodes: HashSet<String>,
    degree: HashMap<String, u64>,
    adj: HashMap<String, HashSet<String>>,
}

impl LinkGraph {
    pub fn from_doc(doc: &GraphDoc) -> Self {
        let nodes = doc
            .nodes
            .iter()
            .filter_map(|n| n.id.as_deref())
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect();

        let mut degree: HashMap<String, u64> = HashMap::new();
        let mut adj: HashMap<String, HashSet<String>> = HashMap::new();
        for link in &doc.links {
            let (source, target) = match (link.source.as_deref(), link.target.as_deref()) {
                (Some(s), Some(t)) if !s.is_empty() && !t.is_empty() => (s, t),
                // Malformed link rows are skipped, never counted.
                _ => continue,
            };
            *degree.entry(source.to_string()).or_default() += 1;
            *degree.entry(target.to_string()).or_default() += 1;
            adj.entry(source.to_string()).or_default().insert(target.to_string());
            adj.entry(target.to_string()).or_default().insert(source.to_string());
        }

        Self { nodes, degree, adj }
    }

    pub fn degree_of(&self, path: &str) -> u64 {
        self.degree.get(path).copied().unwrap_or(0)
    }

    pub fn max_degree(&self) -> u64 {
        self.degree.values().copied().max().unwrap_or(0)
    }

    pub fn neighbors<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.adj.get(path).into_iter().flatten().map(String::as_str)
    }

    /// First-hop neighbors plus neighbors-of-neighbors, excluding the note
    /// itself. Reachability only — no distance weighting.
    pub fn two_hop<'a>(&'a self, path: &str) -> HashSet<&'a str> {
        let mut reach: HashSet<&str> = HashSet::new();
        for first in self.neighbors(path) {
            reach.insert(first);
            for second in self.neighbors(first) {
                reach.insert(second);
            }
        }
        reach.remove(path);
        reach
    }
}

/// Lookups built from the vault index document. Insertion order is kept so
/// downstream passes that depend on "later entry wins" behave the same way
/// on every run.
#[derive(Debug, Default)]
pub struct VaultIndex {
    paths: Vec<String>,
    meta: HashMap<String, NoteMeta>,
    title_to_path: HashMap<String, String>,
}

impl VaultIndex {
    pub fn from_entries(entries: Vec<IndexEntry>) -> Self {
        let mut index = Self::default();
        for entry in entries {
            let path = match entry.path {
                Some(p) if !p.is_empty() => p,
                _ => continue,
            };
            let title = match entry.title {
                Some(t) if !t.is_empty() => t,
                // Fall back to the filename stem, as the indexer does.
                _ => file_stem(&path).to_string(),
            };
            // First match wins on duplicate titles — an accepted ambiguity.
            index
                .title_to_path
                .entry(title.clone())
                .or_insert_with(|| path.clone());
            let meta = NoteMeta { title, tags: entry.tags, folder: entry.folder };
            if index.meta.insert(path.clone(), meta).is_none() {
                index.paths.push(path);
            }
        }
        index
    }

    pub fn meta(&self, path: &str) -> Option<&NoteMeta> {
        self.meta.get(path)
    }

    pub fn tags(&self, path: &str) -> &[String] {
        self.meta.get(path).map(|m| m.tags.as_slice()).unwrap_or(&[])
    }

    pub fn path_for_title(&self, title: &str) -> Option<&str> {
        self.title_to_path.get(title).map(String::as_str)
    }

    /// Iterate (path, meta) in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NoteMeta)> {
        self.paths.iter().map(move |p| (p.as_str(), &self.meta[p]))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}

/// The four PARA buckets and the folder-name cues that identify them.
/// Both the bare names and the numbered variants some vaults use.
const PARA_CUES: &[(&str, &[&str])] = &[
    ("areas", &["Areas", "01_Areas"]),
    ("projects", &["Projects", "02_Projects"]),
    ("resources", &["Resources", "03_Resources"]),
    ("archives", &["Archives", "04_Archives"]),
];

pub const PARA_BUCKET_COUNT: usize = 4;

/// Classify a folder path into a PARA bucket by whole-segment match.
/// Unrecognized folders classify to the empty string (no bucket).
pub fn detect_para_bucket(folder: &str) -> &'static str {
    if folder.is_empty() {
        return "";
    }
    let wrapped = format!("/{}/", folder.replace('\\', "/"));
    for (bucket, cues) in PARA_CUES {
        for cue in *cues {
            if wrapped.contains(&format!("/{cue}/")) {
                return bucket;
            }
        }
    }
    ""
}

/// A note is a scoring target iff its path contains an `Express/pitch` or
/// `Express/insights` segment pair. Everything else is graph context only.
pub fn target_category(path: &str) -> Option<Category> {
    if path.is_empty() {
        return None;
    }
    let wrapped = format!("/{}/", path.replace('\\', "/"));
    if wrapped.contains("/Express/pitch/") {
        Some(Category::Pitch)
    } else if wrapped.contains("/Express/insights/") {
        Some(Category::Insight)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(links: &[(&str, &str)]) -> GraphDoc {
        GraphDoc {
            nodes: Vec::new(),
            links: links
                .iter()
                .map(|(s, t)| GraphLink {
                    source: Some(s.to_string()),
                    target: Some(t.to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn degree_counts_both_endpoints() {
        let graph = LinkGraph::from_doc(&doc(&[("a", "b"), ("a", "c"), ("b", "a")]));
        assert_eq!(graph.degree_of("a"), 3);
        assert_eq!(graph.degree_of("b"), 2);
        assert_eq!(graph.degree_of("c"), 1);
        assert_eq!(graph.max_degree(), 3);
        assert_eq!(graph.degree_of("missing"), 0);
    }

    #[test]
    fn malformed_links_are_skipped() {
        let mut d = doc(&[("a", "b")]);
        d.links.push(GraphLink { source: Some("a".into()), target: None });
        d.links.push(GraphLink { source: None, target: Some("b".into()) });
        d.links.push(GraphLink { source: Some(String::new()), target: Some("b".into()) });
        let graph = LinkGraph::from_doc(&d);
        assert_eq!(graph.degree_of("a"), 1);
        assert_eq!(graph.degree_of("b"), 1);
    }

    #[test]
    fn two_hop_excludes_self_and_unions_directions() {
        // a - b - c, plus c -> d. From a: {b, c}; from b: {a, c, d}.
        let graph = LinkGraph::from_doc(&doc(&[("a", "b"), ("b", "c"), ("c", "d")]));
        let reach_a: HashSet<&str> = graph.two_hop("a");
        assert_eq!(reach_a, HashSet::from(["b", "c"]));
        let reach_b: HashSet<&str> = graph.two_hop("b");
        assert_eq!(reach_b, HashSet::from(["a", "c", "d"]));
    }

    #[test]
    fn index_first_title_match_wins_and_stem_fallback() {
        let entries: Vec<IndexEntry> = serde_json::from_str(
            r#"[
                {"path": "x/one.md", "title": "Dup", "tags": [], "folder": "x"},
                {"path": "y/two.md", "title": "Dup", "tags": [], "folder": "y"},
                {"path": "z/bare note.md", "folder": "z"}
            ]"#,
        )
        .unwrap();
        let index = VaultIndex::from_entries(entries);
        assert_eq!(index.path_for_title("Dup"), Some("x/one.md"));
        assert_eq!(index.meta("z/bare note.md").unwrap().title, "bare note");
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn duplicate_paths_keep_position_take_latest_meta() {
        let entries: Vec<IndexEntry> = serde_json::from_str(
            r#"[
                {"path": "a.md", "title": "Old", "tags": ["t1"], "folder": ""},
                {"path": "b.md", "title": "B", "tags": [], "folder": ""},
                {"path": "a.md", "title": "New", "tags": ["t2"], "folder": ""}
            ]"#,
        )
        .unwrap();
        let index = VaultIndex::from_entries(entries);
        let order: Vec<&str> = index.iter().map(|(p, _)| p).collect();
        assert_eq!(order, vec!["a.md", "b.md"]);
        assert_eq!(index.meta("a.md").unwrap().title, "New");
        assert_eq!(index.tags("a.md"), ["t2"]);
    }

    #[test]
    fn para_buckets_match_whole_segments() {
        assert_eq!(detect_para_bucket("Projects/2025"), "projects");
        assert_eq!(detect_para_bucket("vault/01_Areas/Health"), "areas");
        assert_eq!(detect_para_bucket("03_Resources"), "resources");
        assert_eq!(detect_para_bucket("Archives"), "archives");
        assert_eq!(detect_para_bucket("MyProjectsNotes"), "");
        assert_eq!(detect_para_bucket(""), "");
    }

    #[test]
    fn target_detection() {
        assert_eq!(target_category("Express/pitch/a.md"), Some(Category::Pitch));
        assert_eq!(
            target_category("Sync/Express/insights/b.md"),
            Some(Category::Insight)
        );
        assert_eq!(target_category("Express/pitchdeck/a.md"), None);
        assert_eq!(target_category("Areas/Express.md"), None);
        assert_eq!(target_category(""), None);
    }
}
