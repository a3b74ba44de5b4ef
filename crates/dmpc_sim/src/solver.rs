//! The per-agent replan step: assembles the standard-form QP from the
//! previous iterate's frozen horizon snapshot and the agent's currently
//! assigned goal, solves it, and extracts the next predicted horizon and
//! commanded acceleration sequence.

use dmpc_avoidance::{self, AvoidanceGeometry, CollisionMethod, BVC_ALPHA};
use dmpc_bezier::BezierBasis;
use dmpc_linalg::{Float, Horizon, Point3};
use dmpc_qp::{
    box_inequality_rows, build_cost, collision_rows, initial_state_rows, solve, CostWeights,
    FlightMode, LimitBounds, QpProblem, SolveStatus,
};
use ndarray::{s, Array1, Array2};

/// The outcome of one replan tick for a single agent.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// The new predicted horizon, `P_i`, to publish and use as next tick's
    /// linearization point.
    pub horizon: Horizon,
    /// Sampled commanded acceleration over the prediction horizon,
    /// `u_i(0..K-1)`.
    pub accelerations: Vec<Point3>,
    /// Flight mode the tracking/smoothness weights were chosen from.
    pub mode: FlightMode,
    /// `true` if the QP solve failed (infeasible or non-finite) and the
    /// previous horizon/zero acceleration fallback was used instead.
    pub fallback: bool,
}

/// Composes the Bézier basis, cost, and constraint builders for one agent
/// and calls the QP. Stateless and shared across all commanded agents:
/// homogeneous agents means the same basis, weights, limits and geometry
/// apply to every one of them.
#[derive(Debug, Clone)]
pub struct AgentSolver {
    basis: BezierBasis,
    weights: CostWeights,
    limits: LimitBounds,
    geometry: AvoidanceGeometry,
    method: CollisionMethod,
}

impl AgentSolver {
    #[must_use]
    pub fn new(
        basis: BezierBasis,
        weights: CostWeights,
        limits: LimitBounds,
        geometry: AvoidanceGeometry,
        method: CollisionMethod,
    ) -> Self {
        Self {
            basis,
            weights,
            limits,
            geometry,
            method,
        }
    }

    #[must_use]
    pub fn basis(&self) -> &BezierBasis {
        &self.basis
    }

    /// The minimum ellipsoidal distance from `agent_index`'s previous
    /// horizon to any other body's, scanned over the full horizon.
    fn min_neighbor_distance(&self, agent_index: usize, horizons: &[Horizon]) -> Float {
        let own = &horizons[agent_index];
        let mut min_d = Float::INFINITY;
        for (k, &p_i) in own.iter().enumerate() {
            for (j, other) in horizons.iter().enumerate() {
                if j == agent_index {
                    continue;
                }
                let Some(&p_j) = other.get(k) else {
                    continue;
                };
                let ellipse = if agent_index >= self.geometry.n_cmd || j >= self.geometry.n_cmd {
                    // mirrors `AvoidanceGeometry::ellipse_for_pair`, not
                    // exposed publicly since only the avoider needs it.
                    self.obstacle_ellipse()
                } else {
                    self.geometry.commanded
                };
                let d = ellipse.distance(p_i, p_j);
                if d < min_d {
                    min_d = d;
                }
            }
        }
        min_d
    }

    fn obstacle_ellipse(&self) -> dmpc_linalg::Ellipse {
        self.geometry.obstacle
    }

    /// Resolves the flight mode from the minimum neighbor distance, using
    /// the commanded footprint's `r_min` as the repulsion threshold and
    /// BVC's dilation factor on it as the obstacle-present threshold — the
    /// same two thresholds the two avoiders themselves key off of, so no
    /// new tuning constant is introduced.
    fn select_mode(&self, min_dist: Float) -> FlightMode {
        let r_min = self.geometry.commanded.r_min;
        if min_dist < r_min {
            FlightMode::Repulsion
        } else if min_dist < BVC_ALPHA * r_min {
            FlightMode::ObstaclePresent
        } else {
            FlightMode::Free
        }
    }

    fn pad_with_zero_slack_columns(m: &Array2<Float>, n_slack: usize) -> Array2<Float> {
        let (rows, cols) = m.dim();
        let mut out = Array2::<Float>::zeros((rows, cols + n_slack));
        out.slice_mut(s![.., 0..cols]).assign(m);
        out
    }

    /// Runs one replan tick for `agent_index`: `horizons` is the frozen
    /// snapshot of every body's previous predicted horizon (commanded
    /// agents and static obstacles alike), `horizons[agent_index]` doubling
    /// as the linearization point for its own avoider rows.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn replan(
        &self,
        agent_index: usize,
        p: Point3,
        v: Point3,
        goal: Point3,
        horizons: &[Horizon],
    ) -> SolveOutcome {
        let k_hor = self.basis.k_hor;
        let mode = self.select_mode(self.min_neighbor_distance(agent_index, horizons));

        let constraints =
            dmpc_avoidance::build_constraints(self.method, agent_index, horizons, &self.geometry);
        let n_slack = constraints.len();
        let n_cp = self.basis.decision_vector_len();

        let mut p_ref = Array1::<Float>::zeros(3 * k_hor);
        for axis in 0..3 {
            p_ref
                .slice_mut(s![axis * k_hor..(axis + 1) * k_hor])
                .fill(goal[axis]);
        }

        let (h, f) = build_cost(&self.basis, &self.weights, mode, &p_ref, n_slack);

        let (box_a, box_b) = box_inequality_rows(
            &self.basis,
            self.limits.p_min,
            self.limits.p_max,
            self.limits.a_min,
            self.limits.a_max,
            n_slack,
        );
        let (coll_a, coll_b) = collision_rows(&self.basis, &constraints);
        let a_in = ndarray::concatenate(ndarray::Axis(0), &[box_a.view(), coll_a.view()])
            .expect("box and collision rows share the augmented decision-vector width");
        let b_in = ndarray::concatenate(ndarray::Axis(0), &[box_b.view(), coll_b.view()])
            .expect("box and collision rhs share the same length convention");

        let (init_a, init_b) = initial_state_rows(&self.basis, p, v, n_slack);
        let continuity_padded = Self::pad_with_zero_slack_columns(&self.basis.continuity, n_slack);
        let a_eq = ndarray::concatenate(ndarray::Axis(0), &[init_a.view(), continuity_padded.view()])
            .expect("initial-state and continuity rows share the augmented decision-vector width");
        let continuity_b = Array1::<Float>::zeros(self.basis.continuity.nrows());
        let b_eq = ndarray::concatenate(ndarray::Axis(0), &[init_b.view(), continuity_b.view()])
            .expect("initial-state and continuity rhs share the same length convention");

        let problem = QpProblem {
            h,
            f,
            a_eq,
            b_eq,
            a_in,
            b_in,
        };
        let solution = solve(&problem);

        let all_finite = solution.x.iter().all(|v| v.is_finite());
        if solution.status == SolveStatus::Failed || !all_finite {
            tracing::warn!(agent_index, "QP solve failed, retaining previous horizon and commanding zero acceleration");
            return SolveOutcome {
                horizon: horizons[agent_index].clone(),
                accelerations: vec![[0.0, 0.0, 0.0]; k_hor],
                mode,
                fallback: true,
            };
        }

        let x_cp = solution.x.slice(s![0..n_cp]).to_owned();
        let pos_flat = self.basis.phi_pos.dot(&x_cp);
        let acc_flat = self.basis.phi_acc.dot(&x_cp);

        let mut horizon = Vec::with_capacity(k_hor);
        let mut accelerations = Vec::with_capacity(k_hor);
        for k in 0..k_hor {
            horizon.push([pos_flat[k], pos_flat[k_hor + k], pos_flat[2 * k_hor + k]]);
            accelerations.push([acc_flat[k], acc_flat[k_hor + k], acc_flat[2 * k_hor + k]]);
        }

        SolveOutcome {
            horizon,
            accelerations,
            mode,
            fallback: false,
        }
    }
}
