use std::collections::{HashMap, HashSet};

use crate::config::Weights;
use crate::graph::{LinkGraph, VaultIndex, PARA_BUCKET_COUNT};

/// The three refined signals for one note, each in [0,1], plus their
/// weighted sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinedScore {
    pub link_density: f64,
    pub tag_overlap: f64,
    pub ripple: f64,
    pub score: f64,
}

/// Graph-native scorer: link density, neighborhood tag overlap, and PARA
/// ripple, blended with configurable weights.
pub struct RefinedScorer<'a> {
    graph: &'a LinkGraph,
    index: &'a VaultIndex,
    para_bucket: &'a HashMap<String, &'static str>,
    weights: Weights,
    max_degree: u64,
}

impl<'a> RefinedScorer<'a> {
    pub fn new(
        graph: &'a LinkGraph,
        index: &'a VaultIndex,
        para_bucket: &'a HashMap<String, &'static str>,
        weights: Weights,
    ) -> Self {
        let max_degree = graph.max_degree();
        Self { graph, index, para_bucket, weights, max_degree }
    }

    pub fn score(&self, path: &str) -> RefinedScore {
        let link_density = normalize(self.graph.degree_of(path) as f64, self.max_degree as f64);

        // How much of the note's own vocabulary is echoed by its direct
        // neighborhood. A proxy for thematic embeddedness, not novelty.
        let own_tags: HashSet<&str> = self.index.tags(path).iter().map(String::as_str).collect();
        let tag_overlap = if own_tags.is_empty() {
            0.0
        } else {
            let mut neighbor_tags: HashSet<&str> = HashSet::new();
            for neighbor in self.graph.neighbors(path) {
                neighbor_tags.extend(self.index.tags(neighbor).iter().map(String::as_str));
            }
            let shared = own_tags.intersection(&neighbor_tags).count();
            shared as f64 / own_tags.len() as f64
        };

        // Distinct PARA buckets reachable within two hops, over the four
        // defined buckets. Rewards notes whose influence crosses categories.
        let mut buckets: HashSet<&str> = HashSet::new();
        for reached in self.graph.two_hop(path) {
            match self.para_bucket.get(reached) {
                Some(bucket) if !bucket.is_empty() => {
                    buckets.insert(*bucket);
                }
                _ => {}
            }
        }
        let ripple = normalize(buckets.len() as f64, PARA_BUCKET_COUNT as f64);

        let score = self.weights.link_density * link_density
            + self.weights.tag_overlap * tag_overlap
            + self.weights.ripple * ripple;

        RefinedScore { link_density, tag_overlap, ripple, score }
    }
}

/// v/max clamped to [0,1]; 0 when max is non-positive.
pub fn normalize(v: f64, max: f64) -> f64 {
    if max <= 0.0 {
        0.0
    } else {
        (v / max).clamp(0.0, 1.0)
    }
}
