//! Standardisation and Ward hierarchical clustering of settlement profiles.
//!
//! The linkage follows the matrix convention of `scipy.cluster.hierarchy`:
//! merge `i` creates cluster `n + i` from two earlier clusters.

use serde::{Deserialize, Serialize};

use crate::collect::global_variables::CLUSTER_DISTANCE_THRESHOLD;
use crate::commons::error::{MorphoError, MorphoResult};
use crate::contextual::summative::SummaryTable;

/// One agglomeration step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// Smaller of the two merged cluster ids
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    /// Observations in the new cluster
    pub size: usize,
}

/// One row of `clusters.csv`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub place: String,
    pub cl: usize,
}

/// Column-wise z-scores with the population standard deviation.
/// Constant columns are only centred. Rows must share one width.
pub fn standardize(rows: &[Vec<f64>]) -> MorphoResult<Vec<Vec<f64>>> {
    let n = rows.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let width = rows[0].len();
    if let Some(idx) = rows.iter().position(|r| r.len() != width) {
        return Err(MorphoError::MissingColumn(format!(
            "row {} of the matrix to standardise has {} value(s), expected {}",
            idx,
            rows[idx].len(),
            width
        )));
    }
    let mut out: Vec<Vec<f64>> = rows.to_vec();

    for col in 0..width {
        let mean = rows.iter().map(|r| r[col]).sum::<f64>() / n as f64;
        let variance = rows.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / n as f64;
        let std = variance.sqrt();
        let scale = if std == 0.0 { 1.0 } else { std };
        for row in out.iter_mut() {
            row[col] = (row[col] - mean) / scale;
        }
    }
    Ok(out)
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Ward agglomerative clustering on Euclidean distances.
///
/// Distances between merged clusters are updated with the Lance-Williams
/// formula. Equal distances merge the pair found first scanning slots in
/// observation order. Returns `n - 1` merges sorted by construction.
pub fn ward_linkage(rows: &[Vec<f64>]) -> MorphoResult<Vec<Merge>> {
    let n = rows.len();
    if n == 0 {
        return Err(MorphoError::EmptyInput("settlements to cluster".to_string()));
    }
    let width = rows[0].len();
    if rows.iter().any(|r| r.len() != width) {
        return Err(MorphoError::MissingColumn(
            "rows of the clustering matrix differ in length".to_string(),
        ));
    }
    let non_finite = rows
        .iter()
        .flat_map(|r| r.iter())
        .filter(|v| !v.is_finite())
        .count();
    if non_finite > 0 {
        // NaN summaries have to be dropped or imputed before clustering
        return Err(MorphoError::UndefinedStatistic {
            statistic: "Ward distance",
            observations: non_finite,
        });
    }

    let mut distances = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = euclidean(&rows[i], &rows[j]);
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }

    // slot -> (cluster id, size), None once absorbed
    let mut slots: Vec<Option<(usize, usize)>> = (0..n).map(|i| Some((i, 1))).collect();
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    for step in 0..n.saturating_sub(1) {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if slots[i].is_none() {
                continue;
            }
            for j in (i + 1)..n {
                if slots[j].is_none() {
                    continue;
                }
                let d = distances[i][j];
                if best.map_or(true, |(_, _, best_d)| d < best_d) {
                    best = Some((i, j, d));
                }
            }
        }
        let (i, j, dij) = match best {
            Some(best) => best,
            None => break,
        };
        let (id_i, size_i) = slots[i].unwrap_or((i, 1));
        let (id_j, size_j) = slots[j].unwrap_or((j, 1));

        for k in 0..n {
            if k == i || k == j {
                continue;
            }
            let size_k = match slots[k] {
                Some((_, size)) => size as f64,
                None => continue,
            };
            let (ni, nj) = (size_i as f64, size_j as f64);
            let dik = distances[i][k];
            let djk = distances[j][k];
            let squared = ((size_k + ni) * dik * dik + (size_k + nj) * djk * djk
                - size_k * dij * dij)
                / (size_k + ni + nj);
            let updated = squared.max(0.0).sqrt();
            distances[i][k] = updated;
            distances[k][i] = updated;
        }

        slots[i] = Some((n + step, size_i + size_j));
        slots[j] = None;
        merges.push(Merge {
            left: id_i.min(id_j),
            right: id_i.max(id_j),
            distance: dij,
            size: size_i + size_j,
        });
    }

    Ok(merges)
}

/// Flat clusters such that no cluster joins observations merged above
/// `threshold`. Cluster ids run from 1 in order of first observation.
pub fn fcluster_distance(merges: &[Merge], n: usize, threshold: f64) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    // representative observation of every cluster id
    let mut representative: Vec<usize> = (0..n).collect();
    for merge in merges {
        let a = representative[merge.left];
        let b = representative[merge.right];
        representative.push(a);
        if merge.distance <= threshold {
            let root_a = find(&mut parent, a);
            let root_b = find(&mut parent, b);
            if root_a != root_b {
                parent[root_b] = root_a;
            }
        }
    }

    let mut labels = vec![0; n];
    let mut ids: Vec<(usize, usize)> = Vec::new();
    for (obs, label) in labels.iter_mut().enumerate() {
        let root = find(&mut parent, obs);
        *label = match ids.iter().find(|(r, _)| *r == root) {
            Some(&(_, id)) => id,
            None => {
                let id = ids.len() + 1;
                ids.push((root, id));
                id
            }
        };
    }
    labels
}

/// Standardise a summary table and cut its Ward dendrogram at `threshold`.
/// Returns the standardised matrix and the assignment of each row.
pub fn cluster_settlements(
    summary: &SummaryTable,
    threshold: f64,
) -> MorphoResult<(Vec<Vec<f64>>, Vec<ClusterAssignment>)> {
    let standardized = standardize(&summary.matrix())?;
    let merges = ward_linkage(&standardized)?;
    let labels = fcluster_distance(&merges, standardized.len(), threshold);

    let assignments = summary
        .labels()
        .into_iter()
        .zip(labels)
        .map(|(place, cl)| ClusterAssignment { place, cl })
        .collect();
    Ok((standardized, assignments))
}

/// `cluster_settlements` at the study's cut height
pub fn cluster_settlements_default(
    summary: &SummaryTable,
) -> MorphoResult<(Vec<Vec<f64>>, Vec<ClusterAssignment>)> {
    cluster_settlements(summary, CLUSTER_DISTANCE_THRESHOLD)
}
