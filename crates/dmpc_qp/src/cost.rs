//! Cost composition for the per-agent QP.

use dmpc_bezier::BezierBasis;
use dmpc_linalg::{Float, Matrix, Point3, Vector};
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};

/// The flight mode selects which set of tracking/smoothness weights apply,
/// chosen by the caller from a scalar threshold on the minimum ellipsoidal
/// distance to neighbors along the previous horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightMode {
    /// No nearby neighbors: optimize purely for tracking.
    Free,
    /// At least one neighbor within the obstacle-present threshold.
    ObstaclePresent,
    /// At least one neighbor within the tighter repulsion threshold.
    Repulsion,
}

/// Tracking, smoothness, acceleration-energy and collision-slack weights,
/// one triple per flight mode plus the shared acceleration/collision terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    pub s_free: Float,
    pub s_obs: Float,
    pub s_repel: Float,
    pub spd_f: Float,
    pub spd_o: Float,
    pub spd_r: Float,
    pub acc_cost: Float,
    pub lin_coll: Float,
    pub quad_coll: Float,
}

impl CostWeights {
    fn tracking_weight(&self, mode: FlightMode) -> Float {
        match mode {
            FlightMode::Free => self.s_free,
            FlightMode::ObstaclePresent => self.s_obs,
            FlightMode::Repulsion => self.s_repel,
        }
    }

    fn smoothness_weight(&self, mode: FlightMode) -> Float {
        match mode {
            FlightMode::Free => self.spd_f,
            FlightMode::ObstaclePresent => self.spd_o,
            FlightMode::Repulsion => self.spd_r,
        }
    }
}

/// Box limits on sampled position and acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitBounds {
    pub p_min: Point3,
    pub p_max: Point3,
    pub a_min: Point3,
    pub a_max: Point3,
}

/// Builds `H` and `f` such that `½xᵀHx + fᵀx` equals (up to an additive
/// constant) `s_mode·‖Φ_pos x − p_ref‖² + spd_mode·x'Q_E x + acc_cost·‖Φ_acc
/// x‖² + lin_coll·1's + quad_coll·‖s‖²` over the augmented decision vector
/// `[control points; slacks]`. Every quadratic term here is doubled going
/// into `H` to cancel clarabel's own leading `½`.
#[must_use]
pub fn build_cost(
    basis: &BezierBasis,
    weights: &CostWeights,
    mode: FlightMode,
    p_ref: &Vector<Float>,
    n_slack: usize,
) -> (Matrix<Float>, Vector<Float>) {
    let n_cp = basis.decision_vector_len();
    let n = n_cp + n_slack;

    let s_w = weights.tracking_weight(mode);
    let spd_w = weights.smoothness_weight(mode);

    let mut h = Array2::<Float>::zeros((n, n));
    let mut f = Array1::<Float>::zeros(n);

    // Tracking: s_w * Φ_posᵀΦ_pos, f += -s_w * Φ_posᵀ p_ref. Doubled because
    // clarabel's objective is ½xᵀHx + fᵀx, not xᵀHx + fᵀx.
    let phi_pos_t = basis.phi_pos.t();
    h.slice_mut(s![0..n_cp, 0..n_cp])
        .scaled_add(2.0 * s_w, &phi_pos_t.dot(&basis.phi_pos));
    f.slice_mut(s![0..n_cp])
        .scaled_add(-2.0 * s_w, &phi_pos_t.dot(p_ref));

    // Input smoothness: spd_w * Q_E
    h.slice_mut(s![0..n_cp, 0..n_cp])
        .scaled_add(2.0 * spd_w, &basis.energy);

    // Acceleration energy: acc_cost * Φ_accᵀΦ_acc
    let phi_acc_t = basis.phi_acc.t();
    h.slice_mut(s![0..n_cp, 0..n_cp])
        .scaled_add(2.0 * weights.acc_cost, &phi_acc_t.dot(&basis.phi_acc));

    // Collision slack penalty: lin_coll · 1's + quad_coll · ‖s‖²
    if n_slack > 0 {
        for i in 0..n_slack {
            h[[n_cp + i, n_cp + i]] += 2.0 * weights.quad_coll;
            f[n_cp + i] += weights.lin_coll;
        }
    }

    (h, f)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;
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

    fn weights() -> CostWeights {
        CostWeights {
            s_free: 10.0,
            s_obs: 20.0,
            s_repel: 40.0,
            spd_f: 1.0,
            spd_o: 2.0,
            spd_r: 4.0,
            acc_cost: 0.1,
            lin_coll: 1000.0,
            quad_coll: 1000.0,
        }
    }

    #[test]
    fn cost_matrix_is_square_and_symmetric() {
        let basis = basis();
        let p_ref = Array1::zeros(3 * basis.k_hor);
        let (h, _f) = build_cost(&basis, &weights(), FlightMode::Free, &p_ref, 2);
        assert_eq!(h.nrows(), h.ncols());
        for i in 0..h.nrows() {
            for j in 0..h.ncols() {
                assert_relative_eq!(h[[i, j]], h[[j, i]], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn tracking_and_slack_weights_scale_at_the_configured_ratio() {
        // With p_ref at the origin and a single control point isolated via
        // phi_pos, doubling s_free must double that diagonal entry at the
        // same rate quad_coll doubles the slack diagonal, not at 2x its rate.
        let basis = basis();
        let p_ref = Array1::zeros(3 * basis.k_hor);
        let n_cp = basis.decision_vector_len();

        let mut low = weights();
        low.s_free = 10.0;
        low.quad_coll = 10.0;
        let mut high = low;
        high.s_free = 20.0;
        high.quad_coll = 20.0;

        let (h_low, _) = build_cost(&basis, &low, FlightMode::Free, &p_ref, 1);
        let (h_high, _) = build_cost(&basis, &high, FlightMode::Free, &p_ref, 1);

        let slack_delta = h_high[[n_cp, n_cp]] - h_low[[n_cp, n_cp]];
        let tracking_delta = h_high[[0, 0]] - h_low[[0, 0]];
        // Both deltas come from a weight step of 10 through the same
        // "double into H" convention, so each must match its own basis
        // contribution at a factor of 2, not 2 for one and 1 for the other.
        let phi_pos_t = basis.phi_pos.t();
        let expected_tracking_coeff = 2.0 * phi_pos_t.dot(&basis.phi_pos)[[0, 0]];
        let expected_slack_coeff = 2.0;
        assert_relative_eq!(tracking_delta / 10.0, expected_tracking_coeff, epsilon = 1e-9);
        assert_relative_eq!(slack_delta / 10.0, expected_slack_coeff, epsilon = 1e-9);
    }

    #[test]
    fn higher_modes_use_higher_tracking_weight() {
        let basis = basis();
        let p_ref = Array1::zeros(3 * basis.k_hor);
        let n_cp = basis.decision_vector_len();
        let (h_free, _) = build_cost(&basis, &weights(), FlightMode::Free, &p_ref, 0);
        let (h_repel, _) = build_cost(&basis, &weights(), FlightMode::Repulsion, &p_ref, 0);
        assert!(h_repel[[n_cp - 1, n_cp - 1]] >= h_free[[n_cp - 1, n_cp - 1]]);
    }
}
