//! Standard-form quadratic program assembly and the convex solver backend.

mod constraints;
mod cost;
mod problem;

pub use constraints::{box_inequality_rows, initial_state_rows};
pub use cost::{build_cost, CostWeights, FlightMode, LimitBounds};
pub use problem::{solve, QpProblem, QpSolution, SolveStatus};

use dmpc_bezier::BezierBasis;
use dmpc_linalg::{Matrix, Point3, Vector};
use ndarray::{s, Array1, Array2};

/// One linearized collision half-plane emitted by an avoider for a single
/// `(i, j, k)` triple: a row of
/// `A_in`, indexed to the `k`-th position block of `Φ_pos`, plus the
/// elastic slack coupling `-d^{q-1}`.
#[derive(Debug, Clone)]
pub struct CollisionConstraint {
    /// Horizon step this row applies to.
    pub step: usize,
    /// `-g` used to build `A_in` row `= -gᵀ · Φ_pos[step]`.
    pub gradient: Point3,
    /// `d^{q-1} · (r_min - d)`, the position-independent part of `b`.
    pub rhs_offset: dmpc_linalg::Float,
    /// `d^{q-1}`, the coefficient coupling this row to its slack column.
    pub slack_coefficient: dmpc_linalg::Float,
}

/// Builds `A_in` rows and `b_in` entries from a batch of collision
/// constraints against one agent's `Φ_pos`. Each row gets its own slack
/// column, appended after the control-point columns in the decision vector.
#[must_use]
pub fn collision_rows(
    basis: &BezierBasis,
    constraints: &[CollisionConstraint],
) -> (Matrix<dmpc_linalg::Float>, Vector<dmpc_linalg::Float>) {
    let n_cp = basis.decision_vector_len();
    let n_slack = constraints.len();
    let n_cols = n_cp + n_slack;
    let mut a = Array2::<dmpc_linalg::Float>::zeros((n_slack, n_cols));
    let mut b = Array1::<dmpc_linalg::Float>::zeros(n_slack);

    let k_hor = basis.k_hor;
    for (row, c) in constraints.iter().enumerate() {
        for axis in 0..3 {
            let phi_row = basis.phi_pos.row(axis * k_hor + c.step);
            a.slice_mut(s![row, 0..n_cp])
                .scaled_add(-c.gradient[axis], &phi_row);
        }
        a[[row, n_cp + row]] = -c.slack_coefficient;
        b[row] = c.rhs_offset;
    }
    (a, b)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dmpc_bezier::BezierParams;

    use super::*;

    fn basis() -> BezierBasis {
        BezierBasis::new(
            BezierParams {
                degree: 5,
                num_segments: 2,
                dim: 3,
                deg_poly: 3,
                t_segment: 1.0,
            },
            8,
            0.2,
        )
        .unwrap()
    }

    #[test]
    fn no_constraints_yields_empty_block() {
        let basis = basis();
        let (a, b) = collision_rows(&basis, &[]);
        assert_eq!(a.nrows(), 0);
        assert_eq!(b.len(), 0);
    }

    #[test]
    fn one_constraint_adds_one_slack_column() {
        let basis = basis();
        let n_cp = basis.decision_vector_len();
        let constraints = vec![CollisionConstraint {
            step: 0,
            gradient: [1.0, 0.0, 0.0],
            rhs_offset: 0.1,
            slack_coefficient: 0.05,
        }];
        let (a, _b) = collision_rows(&basis, &constraints);
        assert_eq!(a.ncols(), n_cp + 1);
        assert_eq!(a[[0, n_cp]], -0.05);
    }
}
