//! Box inequality constraints and initial-state equality constraints.

use dmpc_bezier::BezierBasis;
use dmpc_linalg::{Float, Matrix, Point3, Vector};
use ndarray::{s, Array1, Array2};

/// Stacks `Φ_pos x <= p_max`, `-Φ_pos x <= -p_min`, `Φ_acc x <= a_max`,
/// `-Φ_acc x <= -a_min` into one `A_in x <= b_in` block, sized to the
/// augmented `[control points; slacks]` decision vector (the slack columns
/// are left at zero; box rows never touch slacks).
#[must_use]
pub fn box_inequality_rows(
    basis: &BezierBasis,
    p_min: Point3,
    p_max: Point3,
    a_min: Point3,
    a_max: Point3,
    n_slack: usize,
) -> (Matrix<Float>, Vector<Float>) {
    let n_cp = basis.decision_vector_len();
    let n_cols = n_cp + n_slack;
    let k_hor = basis.k_hor;

    let n_pos_rows = 2 * 3 * k_hor;
    let n_acc_rows = 2 * 3 * k_hor;
    let mut a = Array2::<Float>::zeros((n_pos_rows + n_acc_rows, n_cols));
    let mut b = Array1::<Float>::zeros(n_pos_rows + n_acc_rows);

    let mut row = 0;
    for axis in 0..3 {
        for k in 0..k_hor {
            let phi_row = basis.phi_pos.row(axis * k_hor + k);
            a.slice_mut(s![row, 0..n_cp]).assign(&phi_row);
            b[row] = p_max[axis];
            row += 1;
            a.slice_mut(s![row, 0..n_cp]).scaled_add(-1.0, &phi_row);
            b[row] = -p_min[axis];
            row += 1;
        }
    }
    for axis in 0..3 {
        for k in 0..k_hor {
            let phi_row = basis.phi_acc.row(axis * k_hor + k);
            a.slice_mut(s![row, 0..n_cp]).assign(&phi_row);
            b[row] = a_max[axis];
            row += 1;
            a.slice_mut(s![row, 0..n_cp]).scaled_add(-1.0, &phi_row);
            b[row] = -a_min[axis];
            row += 1;
        }
    }

    (a, b)
}

/// Fixes the first two control points of each axis to the agent's current
/// position and velocity: `P_0 = p`, `P_1 - P_0 = v * t_segment / degree`.
#[must_use]
pub fn initial_state_rows(
    basis: &BezierBasis,
    p: Point3,
    v: Point3,
    n_slack: usize,
) -> (Matrix<Float>, Vector<Float>) {
    let n_cp = basis.decision_vector_len();
    let n_cols = n_cp + n_slack;
    let cp_per_dim = basis.control_points_per_dim;
    let degree = basis.params.degree as Float;
    let t_segment = basis.params.t_segment;

    let mut a = Array2::<Float>::zeros((6, n_cols));
    let mut b = Array1::<Float>::zeros(6);

    for axis in 0..3 {
        let base = axis * cp_per_dim;
        // P_0 == p[axis]
        a[[axis * 2, base]] = 1.0;
        b[axis * 2] = p[axis];
        // P_1 - P_0 == v[axis] * t_segment / degree
        a[[axis * 2 + 1, base]] = -1.0;
        a[[axis * 2 + 1, base + 1]] = 1.0;
        b[axis * 2 + 1] = v[axis] * t_segment / degree;
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
    fn box_rows_count_matches_two_per_step_per_axis_per_bound() {
        let basis = basis();
        let (a, b) = box_inequality_rows(
            &basis,
            [-10.0; 3],
            [10.0; 3],
            [-5.0; 3],
            [5.0; 3],
            3,
        );
        assert_eq!(a.nrows(), 4 * 3 * basis.k_hor);
        assert_eq!(b.len(), a.nrows());
    }

    #[test]
    fn initial_state_pins_first_two_control_points() {
        let basis = basis();
        let (a, b) = initial_state_rows(&basis, [1.0, 2.0, 3.0], [0.0, 0.0, 0.0], 0);
        assert_eq!(a.nrows(), 6);
        assert_eq!(b[0], 1.0);
        assert_eq!(b[2], 2.0);
        assert_eq!(b[4], 3.0);
    }
}
