//! BIRCH: a clustering-feature (CF) tree compresses the customers into
//! leaf subclusters no wider than `threshold`; Ward clustering then
//! groups the subcluster centroids into `n_clusters` global labels.

use super::{
    hierarchical::ward_labels,
    linalg::{nearest, rows_to_vecs, sq_dist},
    params::BirchParams,
    AlgorithmSpec, Fitted, ModelState,
};
use crate::{config::BirchTuning, error::SegResult, types::ClusterLabel};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Clustering feature: count, linear sum, squared sum.
#[derive(Debug, Clone)]
struct Cf {
    n: f64,
    ls: Array1<f64>,
    ss: f64,
}

impl Cf {
    fn point(p: ArrayView1<f64>) -> Self {
        Self {
            n: 1.0,
            ls: p.to_owned(),
            ss: p.iter().map(|v| v * v).sum(),
        }
    }

    fn centroid(&self) -> Array1<f64> {
        &self.ls / self.n
    }

    fn absorb(&mut self, other: &Cf) {
        self.n += other.n;
        self.ls += &other.ls;
        self.ss += other.ss;
    }

    /// Radius of the subcluster after absorbing `other`.
    fn merged_radius(&self, other: &Cf) -> f64 {
        let n = self.n + other.n;
        let ls = &self.ls + &other.ls;
        let ss = self.ss + other.ss;
        let c_sq: f64 = ls.iter().map(|v| v * v).sum::<f64>() / (n * n);
        (ss / n - c_sq).max(0.0).sqrt()
    }
}

#[derive(Debug)]
struct Entry {
    cf: Cf,
    child: Option<Box<Node>>,
}

#[derive(Debug, Default)]
struct Node {
    entries: Vec<Entry>,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.entries.iter().all(|e| e.child.is_none())
    }

    fn closest(&self, cf: &Cf) -> Option<usize> {
        let c = cf.centroid();
        let mut best = None;
        let mut best_d = f64::INFINITY;
        for (i, e) in self.entries.iter().enumerate() {
            let d = sq_dist(e.cf.centroid().view(), c.view());
            if d < best_d {
                best_d = d;
                best = Some(i);
            }
        }
        best
    }

    /// Insert a point CF. Returns the two halves if this node overflowed.
    fn insert(&mut self, cf: Cf, threshold: f64, branching: usize) -> Option<(Node, Node)> {
        let leaf = self.is_leaf();
        match self.closest(&cf) {
            None => self.entries.push(Entry { cf, child: None }),
            Some(i) if leaf => {
                if self.entries[i].cf.merged_radius(&cf) <= threshold {
                    self.entries[i].cf.absorb(&cf);
                } else {
                    self.entries.push(Entry { cf, child: None });
                }
            }
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.cf.absorb(&cf);
                let split = entry
                    .child
                    .as_mut()
                    .and_then(|child| child.insert(cf, threshold, branching));
                if let Some((left, right)) = split {
                    self.entries.remove(i);
                    self.entries.push(Entry::from_node(left));
                    self.entries.push(Entry::from_node(right));
                }
            }
        }

        if self.entries.len() > branching {
            Some(self.split())
        } else {
            None
        }
    }

    /// Split on the farthest pair of entries; the rest go to the nearer seed.
    fn split(&mut self) -> (Node, Node) {
        let centroids: Vec<Array1<f64>> = self.entries.iter().map(|e| e.cf.centroid()).collect();
        let (mut a, mut b, mut far) = (0, 1, -1.0);
        for i in 0..centroids.len() {
            for j in (i + 1)..centroids.len() {
                let d = sq_dist(centroids[i].view(), centroids[j].view());
                if d > far {
                    far = d;
                    a = i;
                    b = j;
                }
            }
        }

        let mut left = Node::default();
        let mut right = Node::default();
        for (i, entry) in std::mem::take(&mut self.entries).into_iter().enumerate() {
            let to_left = i == a
                || (i != b
                    && sq_dist(centroids[i].view(), centroids[a].view())
                        <= sq_dist(centroids[i].view(), centroids[b].view()));
            if to_left {
                left.entries.push(entry);
            } else {
                right.entries.push(entry);
            }
        }
        (left, right)
    }

    fn collect_leaves(&self, out: &mut Vec<Array1<f64>>) {
        for e in &self.entries {
            match &e.child {
                Some(child) => child.collect_leaves(out),
                None => out.push(e.cf.centroid()),
            }
        }
    }
}

impl Entry {
    fn from_node(node: Node) -> Self {
        let mut cf: Option<Cf> = None;
        for e in &node.entries {
            match cf.as_mut() {
                Some(acc) => acc.absorb(&e.cf),
                None => cf = Some(e.cf.clone()),
            }
        }
        Self {
            cf: cf.unwrap_or(Cf {
                n: 0.0,
                ls: Array1::zeros(0),
                ss: 0.0,
            }),
            child: Some(Box::new(node)),
        }
    }
}

pub fn fit(x: &Array2<f64>, params: &BirchParams, tuning: &BirchTuning) -> SegResult<Fitted> {
    let branching = tuning.branching_factor.max(2);
    let mut root = Node::default();
    for row in x.axis_iter(Axis(0)) {
        if let Some((left, right)) = root.insert(Cf::point(row), params.threshold, branching) {
            root.entries = vec![Entry::from_node(left), Entry::from_node(right)];
        }
    }

    let mut leaves = Vec::new();
    root.collect_leaves(&mut leaves);
    let mut subclusters = Array2::<f64>::zeros((leaves.len(), x.ncols()));
    for (i, c) in leaves.iter().enumerate() {
        subclusters.row_mut(i).assign(c);
    }

    let sub_labels: Vec<usize> = if leaves.len() >= params.n_clusters {
        ward_labels(&subclusters, params.n_clusters)
    } else {
        log::warn!(
            "birch: only {} subclusters for n_clusters={} (threshold={}); each subcluster is its own cluster",
            leaves.len(),
            params.n_clusters,
            params.threshold
        );
        (0..leaves.len()).collect()
    };

    let labels: Vec<ClusterLabel> = x
        .axis_iter(Axis(0))
        .map(|row| sub_labels[nearest(row, &subclusters)] as ClusterLabel)
        .collect();

    log::debug!("birch: {} leaf subclusters", leaves.len());

    Ok(Fitted {
        labels,
        state: ModelState::Subclusters {
            centroids: rows_to_vecs(&subclusters),
            labels: sub_labels.into_iter().map(|l| l as ClusterLabel).collect(),
        },
        resolved: AlgorithmSpec::Birch(params.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn tight_points_share_a_subcluster() {
        let x = array![[0.0, 0.0], [0.01, 0.0], [5.0, 5.0], [5.01, 5.0]];
        let params = BirchParams {
            n_clusters: 2,
            threshold: 0.5,
        };
        let fitted = fit(&x, &params, &BirchTuning::default()).unwrap();
        assert_eq!(fitted.labels[0], fitted.labels[1]);
        assert_eq!(fitted.labels[2], fitted.labels[3]);
        assert_ne!(fitted.labels[0], fitted.labels[2]);
        match fitted.state {
            ModelState::Subclusters { centroids, .. } => assert_eq!(centroids.len(), 2),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn small_branching_factor_still_covers_every_point() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| (i * (j + 1)) as f64 * 0.37);
        let params = BirchParams {
            n_clusters: 3,
            threshold: 0.1,
        };
        let tuning = BirchTuning { branching_factor: 3 };
        let fitted = fit(&x, &params, &tuning).unwrap();
        assert_eq!(fitted.labels.len(), 40);
        assert!(fitted.labels.iter().all(|l| (0..3).contains(l)));
    }
}
