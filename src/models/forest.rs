//! Random forest classifier for the good/bad credit labels.
//!
//! Each tree is a CART tree grown with Gini impurity on a bootstrap
//! resample of the corpus. Class weights multiply the bootstrap counts so a
//! skewed corpus does not drown out the minority label. Prediction averages
//! the per-class leaf distributions of all trees.

use crate::error::{Result, ScoringError};
use crate::feature_extractor::{FeatureVector, FEATURE_COUNT};
use crate::synthetic::BAD_CREDIT;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Class weighting applied while growing trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    /// Weight each class by `n_samples / (n_classes * class_count)`
    #[default]
    Balanced,
    /// Every sample counts once per bootstrap draw
    None,
}

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub class_weight: ClassWeight,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            class_weight: ClassWeight::Balanced,
            seed: 42,
        }
    }
}

/// Predicted class probabilities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    /// Probability of good credit (label 0)
    pub good: f64,
    /// Probability of bad credit (label 1)
    pub bad: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Node {
    Leaf {
        distribution: [f64; 2],
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single fitted tree stored as a flat node arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn leaf_distribution(&self, features: &[f64]) -> [f64; 2] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { distribution } => return *distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match &nodes[index] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }

    /// Children always sit after their parent in the arena, which rules
    /// out cycles as well as dangling indices.
    fn is_consistent(&self, n_features: usize) -> bool {
        let len = self.nodes.len();
        len > 0
            && self.nodes.iter().enumerate().all(|(index, node)| match node {
                Node::Leaf { distribution } => distribution.iter().all(|p| p.is_finite()),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    *feature < n_features
                        && !threshold.is_nan()
                        && (index + 1..len).contains(left)
                        && (index + 1..len).contains(right)
                }
            })
    }
}

/// Ensemble of decision trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit a forest on normalized vectors and their labels.
    pub fn fit(features: &[FeatureVector], labels: &[u8], config: &ForestConfig) -> Result<Self> {
        if features.is_empty() {
            return Err(ScoringError::EmptyCorpus);
        }
        if features.len() != labels.len() {
            return Err(ScoringError::validation(
                "labels",
                format!("{} labels for {} feature vectors", labels.len(), features.len()),
            ));
        }
        if config.n_trees == 0 {
            return Err(ScoringError::validation("n_trees", "must be at least 1"));
        }

        let class_weights = class_weights(labels, config.class_weight);
        let max_features = max_features(FEATURE_COUNT);

        info!(
            samples = features.len(),
            trees = config.n_trees,
            max_depth = config.max_depth,
            class_weight = ?config.class_weight,
            "Training random forest"
        );

        let grown: Vec<(DecisionTree, [f64; FEATURE_COUNT])> = (0..config.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(tree_seed(config.seed, t));
                let builder = TreeBuilder {
                    features,
                    labels,
                    max_depth: config.max_depth,
                    min_samples_split: config.min_samples_split.max(2),
                    max_features,
                };
                let weights = bootstrap_weights(&mut rng, labels, &class_weights);
                builder.grow(&weights, &mut rng)
            })
            .collect();

        let mut feature_importances = vec![0.0; FEATURE_COUNT];
        let mut trees = Vec::with_capacity(grown.len());
        for (tree, importances) in grown {
            let total: f64 = importances.iter().sum();
            if total > 0.0 {
                for (acc, value) in feature_importances.iter_mut().zip(importances) {
                    *acc += value / total;
                }
            }
            trees.push(tree);
        }
        let total: f64 = feature_importances.iter().sum();
        if total > 0.0 {
            for value in &mut feature_importances {
                *value /= total;
            }
        }

        debug!(
            mean_nodes = trees.iter().map(|t| t.node_count()).sum::<usize>() / trees.len(),
            "Random forest trained"
        );

        Ok(Self {
            n_features: FEATURE_COUNT,
            trees,
            feature_importances,
        })
    }

    /// Average the leaf class distributions of every tree.
    pub fn predict_proba(&self, features: &[f64]) -> Result<ClassProbabilities> {
        if features.len() != self.n_features {
            return Err(ScoringError::InferenceShape {
                expected: self.n_features,
                actual: features.len(),
            });
        }

        let mut sum = [0.0; 2];
        for tree in &self.trees {
            let distribution = tree.leaf_distribution(features);
            sum[0] += distribution[0];
            sum[1] += distribution[1];
        }
        let n = self.trees.len() as f64;

        Ok(ClassProbabilities {
            good: sum[0] / n,
            bad: sum[1] / n,
        })
    }

    /// Most likely label; ties go to good credit.
    pub fn predict(&self, features: &[f64]) -> Result<u8> {
        let proba = self.predict_proba(features)?;
        Ok(if proba.bad > proba.good { BAD_CREDIT } else { 0 })
    }

    /// Fraction of vectors whose predicted label matches.
    pub fn accuracy(&self, features: &[FeatureVector], labels: &[u8]) -> Result<f64> {
        if features.is_empty() {
            return Err(ScoringError::EmptyCorpus);
        }
        let mut correct = 0usize;
        for (vector, &label) in features.iter().zip(labels) {
            if self.predict(vector.as_slice())? == label {
                correct += 1;
            }
        }
        Ok(correct as f64 / features.len() as f64)
    }

    /// Mean decrease in impurity per feature, summing to 1.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Structural check for forests read back from storage.
    pub fn validate(&self) -> Result<()> {
        if self.n_features != FEATURE_COUNT {
            return Err(ScoringError::InferenceShape {
                expected: FEATURE_COUNT,
                actual: self.n_features,
            });
        }
        if self.trees.is_empty() || !self.trees.iter().all(|t| t.is_consistent(self.n_features)) {
            return Err(ScoringError::ArtifactUnavailable(
                "classifier artifact contains malformed trees".to_string(),
            ));
        }
        Ok(())
    }
}

/// Features sampled per split: `floor(sqrt(d))`, at least one.
fn max_features(n_features: usize) -> usize {
    ((n_features as f64).sqrt().floor() as usize).max(1)
}

fn tree_seed(seed: u64, tree: usize) -> u64 {
    seed.wrapping_add((tree as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn class_weights(labels: &[u8], mode: ClassWeight) -> [f64; 2] {
    match mode {
        ClassWeight::None => [1.0, 1.0],
        ClassWeight::Balanced => {
            let n = labels.len() as f64;
            let mut counts = [0usize; 2];
            for &label in labels {
                counts[usize::from(label == BAD_CREDIT)] += 1;
            }
            let present = counts.iter().filter(|&&c| c > 0).count() as f64;
            counts.map(|c| if c == 0 { 0.0 } else { n / (present * c as f64) })
        }
    }
}

/// Bootstrap draw counts scaled by class weight; zero means out of bag.
fn bootstrap_weights<R: Rng>(rng: &mut R, labels: &[u8], class_weights: &[f64; 2]) -> Vec<f64> {
    let n = labels.len();
    let mut counts = vec![0u32; n];
    for _ in 0..n {
        counts[rng.gen_range(0..n)] += 1;
    }
    counts
        .iter()
        .zip(labels)
        .map(|(&count, &label)| count as f64 * class_weights[usize::from(label == BAD_CREDIT)])
        .collect()
}

fn gini(w: [f64; 2]) -> f64 {
    let total = w[0] + w[1];
    if total <= 0.0 {
        return 0.0;
    }
    let p0 = w[0] / total;
    let p1 = w[1] / total;
    1.0 - p0 * p0 - p1 * p1
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    /// Weighted child impurity `W_l * gini_l + W_r * gini_r`
    impurity: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

struct TreeBuilder<'a> {
    features: &'a [FeatureVector],
    labels: &'a [u8],
    max_depth: usize,
    min_samples_split: usize,
    max_features: usize,
}

impl TreeBuilder<'_> {
    fn grow<R: Rng>(&self, weights: &[f64], rng: &mut R) -> (DecisionTree, [f64; FEATURE_COUNT]) {
        let samples: Vec<usize> = (0..weights.len()).filter(|&i| weights[i] > 0.0).collect();
        let mut nodes = Vec::new();
        let mut importances = [0.0; FEATURE_COUNT];
        self.build(&samples, weights, 0, rng, &mut nodes, &mut importances);
        (DecisionTree { nodes }, importances)
    }

    fn class_totals(&self, samples: &[usize], weights: &[f64]) -> [f64; 2] {
        let mut totals = [0.0; 2];
        for &i in samples {
            totals[usize::from(self.labels[i] == BAD_CREDIT)] += weights[i];
        }
        totals
    }

    fn build<R: Rng>(
        &self,
        samples: &[usize],
        weights: &[f64],
        depth: usize,
        rng: &mut R,
        nodes: &mut Vec<Node>,
        importances: &mut [f64; FEATURE_COUNT],
    ) -> usize {
        let totals = self.class_totals(samples, weights);
        let total = totals[0] + totals[1];
        let index = nodes.len();
        let leaf = Node::Leaf {
            distribution: if total > 0.0 {
                [totals[0] / total, totals[1] / total]
            } else {
                [0.5, 0.5]
            },
        };
        nodes.push(leaf);

        let impurity = gini(totals);
        if depth >= self.max_depth || samples.len() < self.min_samples_split || impurity <= 0.0 {
            return index;
        }

        let Some(split) = self.find_split(samples, weights, rng) else {
            return index;
        };

        importances[split.feature] += total * impurity - split.impurity;

        let left = self.build(&split.left, weights, depth + 1, rng, nodes, importances);
        let right = self.build(&split.right, weights, depth + 1, rng, nodes, importances);
        nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    /// Try features in random order until `max_features` non-constant ones
    /// have been evaluated.
    fn find_split<R: Rng>(&self, samples: &[usize], weights: &[f64], rng: &mut R) -> Option<BestSplit> {
        let mut candidates: Vec<usize> = (0..FEATURE_COUNT).collect();
        candidates.shuffle(rng);

        let mut best: Option<(usize, f64, f64)> = None;
        let mut evaluated = 0;
        let mut order: Vec<usize> = samples.to_vec();

        for feature in candidates {
            if evaluated >= self.max_features {
                break;
            }
            order.sort_by(|&a, &b| {
                self.features[a].0[feature].total_cmp(&self.features[b].0[feature])
            });
            let first = self.features[order[0]].0[feature];
            let last = self.features[order[order.len() - 1]].0[feature];
            if first == last {
                continue;
            }
            evaluated += 1;

            let totals = self.class_totals(&order, weights);
            let mut left = [0.0; 2];
            for pair in 0..order.len() - 1 {
                let i = order[pair];
                left[usize::from(self.labels[i] == BAD_CREDIT)] += weights[i];

                let current = self.features[i].0[feature];
                let next = self.features[order[pair + 1]].0[feature];
                if current == next {
                    continue;
                }

                let right = [totals[0] - left[0], totals[1] - left[1]];
                let impurity =
                    (left[0] + left[1]) * gini(left) + (right[0] + right[1]) * gini(right);
                if best.map_or(true, |(_, _, b)| impurity < b) {
                    let mut threshold = current + (next - current) / 2.0;
                    if threshold >= next {
                        threshold = current;
                    }
                    best = Some((feature, threshold, impurity));
                }
            }
        }

        let (feature, threshold, impurity) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| self.features[i].0[feature] <= threshold);

        Some(BestSplit {
            feature,
            threshold,
            impurity,
            left,
            right,
        })
    }
}
