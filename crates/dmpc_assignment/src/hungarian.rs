//! Minimum-cost perfect bipartite matching, treated as a black-box utility.
//! Backed by `pathfinding`'s Kuhn-Munkres implementation; `ordered-float`
//! bridges `f64` costs into the `Ord` bound it requires.

use ordered_float::OrderedFloat;
use pathfinding::prelude::{kuhn_munkres_min, Matrix};

/// Solves `min sum_i cost[i][assignment[i]]` over all permutations,
/// returning `assignment[i] == j` meaning row `i` is matched to column
/// `j`. `cost` must be square: the assignment is a permutation of
/// `[0, N_cmd)`.
#[must_use]
pub fn min_cost_assignment(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    if n == 0 {
        return Vec::new();
    }
    let weights: Vec<OrderedFloat<f64>> = cost
        .iter()
        .flat_map(|row| row.iter().map(|&v| OrderedFloat(v)))
        .collect();
    let matrix = Matrix::from_vec(n, n, weights).expect("cost matrix must be square");
    let (_total, assignment) = kuhn_munkres_min(&matrix);
    assignment
}
