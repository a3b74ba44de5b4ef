//! Orchestrates one replan tick across all commanded agents: refreshes
//! goal positions, calls the per-agent solver for each commanded agent
//! against a frozen snapshot of every body's previous horizon, and
//! publishes the results with a single atomic swap at tick end.

use dmpc_config::MotionProfile;
use dmpc_linalg::{Float, Horizon, Point3};

use crate::solver::{AgentSolver, SolveOutcome};

/// Evaluates a goal's deterministic motion profile at time `t`, relative to
/// its `base` position (`pf` for that goal index): the goal trajectory at
/// time `t` is deterministic given its motion profile.
///
/// Circular motion is centered on the world origin's xy-projection (through
/// `base`'s own height) with the initial phase read off `base`'s bearing
/// from that center, rather than inventing a second, unnamed "center"
/// configuration key (see `DESIGN.md`).
#[must_use]
pub fn goal_position_at(base: Point3, motion: &MotionProfile, t: Float) -> Point3 {
    match motion {
        MotionProfile::Static => base,
        MotionProfile::Translation { velocity } => [
            base[0] + velocity[0] * t,
            base[1] + velocity[1] * t,
            base[2] + velocity[2] * t,
        ],
        MotionProfile::Circular { radius, omega } => {
            let theta0 = base[1].atan2(base[0]);
            let theta = theta0 + omega * t;
            [radius * theta.cos(), radius * theta.sin(), base[2]]
        }
    }
}

/// Everything the Generator needs to run one replan tick: each commanded
/// agent's current state and the static/uncommanded bodies' fixed
/// positions (held constant every tick as their own one-point "horizon").
#[derive(Debug, Clone, Copy)]
pub struct AgentState {
    pub p: Point3,
    pub v: Point3,
}

/// Owns the per-agent solver and every body's predicted horizon.
#[derive(Debug, Clone)]
pub struct Generator {
    solver: AgentSolver,
    n_cmd: usize,
    /// `pf`, indexed by goal index — the base point each goal's motion
    /// profile is evaluated relative to.
    goal_base: Vec<Point3>,
    motion: MotionProfile,
    /// `assignment[i]` is the goal index agent `i` currently pursues; the
    /// concrete realization of `set_goal_point(i, p)` (see `DESIGN.md` for
    /// why an index, not a frozen point, is stored).
    assignment: Vec<usize>,
    /// One horizon per body, commanded agents first then static obstacles;
    /// obstacle "horizons" are a constant point repeated `k_hor` times.
    horizons: Vec<Horizon>,
    last_modes: Vec<dmpc_qp::FlightMode>,
    last_fallback: Vec<bool>,
}

impl Generator {
    #[must_use]
    pub fn new(
        solver: AgentSolver,
        n_cmd: usize,
        goal_base: Vec<Point3>,
        motion: MotionProfile,
        initial_assignment: Vec<usize>,
        commanded_positions: &[Point3],
        obstacle_positions: &[Point3],
    ) -> Self {
        let k_hor = solver.basis().k_hor;
        let mut horizons = Vec::with_capacity(commanded_positions.len() + obstacle_positions.len());
        for &p in commanded_positions {
            horizons.push(vec![p; k_hor]);
        }
        for &p in obstacle_positions {
            horizons.push(vec![p; k_hor]);
        }
        let n = commanded_positions.len();
        Self {
            solver,
            n_cmd,
            goal_base,
            motion,
            assignment: initial_assignment,
            horizons,
            last_modes: vec![dmpc_qp::FlightMode::Free; n],
            last_fallback: vec![false; n],
        }
    }

    /// Swaps the goal index agent `i` pursues, effective on the next replan
    /// tick; no state is invalidated.
    pub fn set_goal_point(&mut self, agent: usize, goal_index: usize) {
        self.assignment[agent] = goal_index;
    }

    #[must_use]
    pub fn goal_index(&self, agent: usize) -> usize {
        self.assignment[agent]
    }

    /// The current position of the goal assigned to `agent`, at time `t`;
    /// usable at any `t`, not only replan ticks, so the Simulator can log a
    /// continuously-updated goal trajectory between replans.
    #[must_use]
    pub fn goal_position(&self, agent: usize, t: Float) -> Point3 {
        let goal_index = self.assignment[agent];
        goal_position_at(self.goal_base[goal_index], &self.motion, t)
    }

    #[must_use]
    pub fn predicted_horizons(&self) -> &[Horizon] {
        &self.horizons
    }

    #[must_use]
    pub fn last_flight_mode(&self, agent: usize) -> dmpc_qp::FlightMode {
        self.last_modes[agent]
    }

    #[must_use]
    pub fn last_fallback(&self, agent: usize) -> bool {
        self.last_fallback[agent]
    }

    /// Runs one replan tick: refreshes goal positions at `t`, then replans
    /// every commanded agent against the
    /// frozen previous-tick horizon snapshot, and returns each agent's
    /// sampled acceleration sequence (`next_inputs`) after publishing the
    /// new horizons in one swap.
    #[must_use]
    pub fn tick(&mut self, t: Float, states: &[AgentState]) -> Vec<Vec<Point3>> {
        let previous = self.horizons.clone();
        let mut next_horizons = self.horizons.clone();
        let mut next_inputs = Vec::with_capacity(self.n_cmd);

        for (i, state) in states.iter().enumerate() {
            let goal = self.goal_position(i, t);
            let outcome: SolveOutcome =
                self.solver.replan(i, state.p, state.v, goal, &previous);
            next_horizons[i] = outcome.horizon;
            self.last_modes[i] = outcome.mode;
            self.last_fallback[i] = outcome.fallback;
            next_inputs.push(outcome.accelerations);
        }

        self.horizons = next_horizons;
        next_inputs
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn static_goal_is_time_invariant() {
        let base = [1.0, 2.0, 3.0];
        let p0 = goal_position_at(base, &MotionProfile::Static, 0.0);
        let p1 = goal_position_at(base, &MotionProfile::Static, 10.0);
        assert_eq!(p0, p1);
        assert_eq!(p0, base);
    }

    #[test]
    fn translating_goal_advances_linearly() {
        let base = [0.0, 0.0, 1.0];
        let motion = MotionProfile::Translation { velocity: [0.5, 0.0, 0.0] };
        let p = goal_position_at(base, &motion, 4.0);
        assert_relative_eq!(p[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(p[2], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn circular_goal_returns_to_start_after_one_period() {
        let base = [2.0, 0.0, 1.0];
        let motion = MotionProfile::Circular { radius: 2.0, omega: 0.5 };
        let period = std::f64::consts::TAU / 0.5;
        let p = goal_position_at(base, &motion, period);
        assert_relative_eq!(p[0], base[0], epsilon = 1e-6);
        assert_relative_eq!(p[1], base[1], epsilon = 1e-6);
    }

    #[test]
    fn set_goal_point_takes_effect_without_mutating_horizons() {
        let basis = dmpc_bezier::BezierBasis::new(
            dmpc_bezier::BezierParams {
                degree: 5,
                num_segments: 2,
                dim: 3,
                deg_poly: 3,
                t_segment: 1.0,
            },
            4,
            0.2,
        )
        .unwrap();
        let weights = dmpc_qp::CostWeights {
            s_free: 1.0,
            s_obs: 2.0,
            s_repel: 4.0,
            spd_f: 1.0,
            spd_o: 1.0,
            spd_r: 1.0,
            acc_cost: 0.1,
            lin_coll: 100.0,
            quad_coll: 100.0,
        };
        let limits = dmpc_qp::LimitBounds {
            p_min: [-10.0; 3],
            p_max: [10.0; 3],
            a_min: [-5.0; 3],
            a_max: [5.0; 3],
        };
        let geometry = dmpc_avoidance::AvoidanceGeometry {
            commanded: dmpc_linalg::Ellipse::new(2, 0.5, 1.5),
            obstacle: dmpc_linalg::Ellipse::new(2, 0.5, 1.5),
            n_cmd: 1,
        };
        let solver = AgentSolver::new(
            basis,
            weights,
            limits,
            geometry,
            dmpc_avoidance::CollisionMethod::OnDemand,
        );
        let mut gen = Generator::new(
            solver,
            1,
            vec![[1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
            MotionProfile::Static,
            vec![0],
            &[[0.0, 0.0, 0.0]],
            &[],
        );
        assert_eq!(gen.goal_position(0, 0.0), [1.0, 0.0, 0.0]);
        gen.set_goal_point(0, 1);
        assert_eq!(gen.goal_position(0, 0.0), [2.0, 0.0, 0.0]);
    }
}
