// CART regression tree (variance reduction splits), stored as a flat arena.

use rand::seq::index;
use rand::Rng;

/// Minimum decrease in squared error for a split to be worth making.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features considered per split; `None` considers all of them.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` listed in `samples` (repeats allowed,
    /// as produced by bootstrap sampling).
    pub fn fit<R: Rng>(
        x: &[Vec<f64>],
        y: &[f64],
        samples: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut tree = RegressionTree { nodes: Vec::new() };
        let n_features = x.first().map_or(0, Vec::len);
        let mut idx = samples.to_vec();
        tree.grow(x, y, &mut idx, 0, n_features, params, rng);
        tree
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
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
        fn depth_of(nodes: &[Node], node: usize) -> usize {
            match &nodes[node] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            depth_of(&self.nodes, 0)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn grow<R: Rng>(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        idx: &mut [usize],
        depth: usize,
        n_features: usize,
        params: &TreeParams,
        rng: &mut R,
    ) -> usize {
        let node = self.nodes.len();
        let mean = idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len().max(1) as f64;
        self.nodes.push(Node::Leaf { value: mean });

        let depth_exhausted = params.max_depth.is_some_and(|max| depth >= max);
        if idx.len() < params.min_samples_split.max(2) || depth_exhausted {
            return node;
        }

        let Some(split) = best_split(x, y, idx, n_features, params, rng) else {
            return node;
        };

        // Partition in place: rows going left first.
        let mut boundary = 0;
        for i in 0..idx.len() {
            if x[idx[i]][split.feature] <= split.threshold {
                idx.swap(i, boundary);
                boundary += 1;
            }
        }
        if boundary == 0 || boundary == idx.len() {
            return node;
        }
        let (left_idx, right_idx) = idx.split_at_mut(boundary);
        let left = self.grow(x, y, left_idx, depth + 1, n_features, params, rng);
        let right = self.grow(x, y, right_idx, depth + 1, n_features, params, rng);

        self.nodes[node] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node
    }
}

/// Best variance-reducing split over the candidate features, if any split
/// separates at least two distinct values.
fn best_split<R: Rng>(
    x: &[Vec<f64>],
    y: &[f64],
    idx: &[usize],
    n_features: usize,
    params: &TreeParams,
    rng: &mut R,
) -> Option<SplitCandidate> {
    let n = idx.len() as f64;
    let total: f64 = idx.iter().map(|&i| y[i]).sum();
    // Maximizing sum_l^2/n_l + sum_r^2/n_r minimizes the children's squared error.
    let parent_score = total * total / n;

    let candidates: Vec<usize> = match params.max_features {
        Some(k) if k < n_features => index::sample(rng, n_features, k.max(1)).into_vec(),
        _ => (0..n_features).collect(),
    };

    let mut best: Option<SplitCandidate> = None;
    let mut column: Vec<(f64, f64)> = Vec::with_capacity(idx.len());

    for feature in candidates {
        column.clear();
        column.extend(idx.iter().map(|&i| (x[i][feature], y[i])));
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for p in 1..column.len() {
            left_sum += column[p - 1].1;
            if column[p - 1].0 == column[p].0 {
                continue;
            }
            let n_left = p as f64;
            let n_right = n - n_left;
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left + right_sum * right_sum / n_right;
            if score - parent_score > MIN_GAIN && best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: split_threshold(column[p - 1].0, column[p].0),
                    score,
                });
            }
        }
    }
    best
}

/// Midpoint between two adjacent sorted values. For neighbouring floats the
/// midpoint can round up to `hi`, which would send every row left; fall back
/// to `lo` so the split still separates them.
fn split_threshold(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid < hi {
        mid
    } else {
        lo
    }
}
