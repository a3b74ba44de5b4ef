//! Second-order point-mass dynamics with per-axis, critically-damped
//! actuator lag.
//!
//! The officially tracked agent state is position/velocity, but the plant
//! being simulated also carries a hidden acceleration filter state:
//! commanded acceleration does not apply instantaneously, it is shaped by a
//! second-order response before it reaches the point mass. This mismatch
//! between the simulated plant and the double-integrator model the QP
//! assembler predicts against is intentional: it separates the "true"
//! dynamics from the MPC's internal model.

use dmpc_linalg::{Float, Point3};

/// Damping ratio and time constant for one axis group.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AxisParams {
    pub zeta: Float,
    pub tau: Float,
}

/// Per-axis-group actuator lag parameters: `xy` shared by the horizontal
/// axes, `z` for the vertical axis, plus the micro-step interval `Ts`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicsParams {
    pub xy: AxisParams,
    pub z: AxisParams,
    pub ts: Float,
}

impl DynamicsParams {
    fn axis(&self, axis: usize) -> AxisParams {
        if axis == 2 {
            self.z
        } else {
            self.xy
        }
    }
}

/// Full plant state: the officially tracked position/velocity plus the
/// hidden per-axis acceleration-filter state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantState {
    pub p: Point3,
    pub v: Point3,
    a: Point3,
    a_dot: Point3,
}

impl PlantState {
    #[must_use]
    pub fn at_rest(p: Point3) -> Self {
        Self {
            p,
            v: [0.0, 0.0, 0.0],
            a: [0.0, 0.0, 0.0],
            a_dot: [0.0, 0.0, 0.0],
        }
    }

    #[must_use]
    pub fn with_velocity(p: Point3, v: Point3) -> Self {
        Self {
            p,
            v,
            a: [0.0, 0.0, 0.0],
            a_dot: [0.0, 0.0, 0.0],
        }
    }
}

/// One axis' integration state: `[p, v, a, a_dot]`.
type AxisState = [Float; 4];

fn axis_derivative(x: AxisState, u: Float, params: AxisParams) -> AxisState {
    let [_, v, a, a_dot] = x;
    let dadot = (u - a - 2.0 * params.zeta * params.tau * a_dot) / (params.tau * params.tau);
    [v, a, a_dot, dadot]
}

fn axis_add_scaled(x: AxisState, k: AxisState, h: Float) -> AxisState {
    [x[0] + h * k[0], x[1] + h * k[1], x[2] + h * k[2], x[3] + h * k[3]]
}

/// One classical RK4 step of the linear, time-invariant actuator-lag ODE
/// `tau^2 a'' + 2 zeta tau a' + a = u`, critically damped when `zeta == 1`,
/// with DC gain 1 (steady state `a == u`).
fn axis_step(x: AxisState, u: Float, params: AxisParams, dt: Float) -> AxisState {
    let k1 = axis_derivative(x, u, params);
    let k2 = axis_derivative(axis_add_scaled(x, k1, dt / 2.0), u, params);
    let k3 = axis_derivative(axis_add_scaled(x, k2, dt / 2.0), u, params);
    let k4 = axis_derivative(axis_add_scaled(x, k3, dt), u, params);
    [
        x[0] + dt / 6.0 * (k1[0] + 2.0 * k2[0] + 2.0 * k3[0] + k4[0]),
        x[1] + dt / 6.0 * (k1[1] + 2.0 * k2[1] + 2.0 * k3[1] + k4[1]),
        x[2] + dt / 6.0 * (k1[2] + 2.0 * k2[2] + 2.0 * k3[2] + k4[2]),
        x[3] + dt / 6.0 * (k1[3] + 2.0 * k2[3] + 2.0 * k3[3] + k4[3]),
    ]
}

/// Advances `state` by one micro-step of `params.ts` under commanded
/// acceleration `u`. Deterministic and time-invariant: calling this twice
/// with the same `(state, u, params)` yields the same `next_state`.
#[must_use]
pub fn advance(state: PlantState, u: Point3, params: &DynamicsParams) -> PlantState {
    let mut p = [0.0; 3];
    let mut v = [0.0; 3];
    let mut a = [0.0; 3];
    let mut a_dot = [0.0; 3];
    for axis in 0..3 {
        let x0 = [state.p[axis], state.v[axis], state.a[axis], state.a_dot[axis]];
        let x1 = axis_step(x0, u[axis], params.axis(axis), params.ts);
        p[axis] = x1[0];
        v[axis] = x1[1];
        a[axis] = x1[2];
        a_dot[axis] = x1[3];
    }
    PlantState { p, v, a, a_dot }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn critically_damped(ts: Float) -> DynamicsParams {
        let axis = AxisParams { zeta: 1.0, tau: 0.05 };
        DynamicsParams { xy: axis, z: axis, ts }
    }

    #[test]
    fn steady_state_tracks_constant_command_with_unity_gain() {
        let params = critically_damped(0.005);
        let mut state = PlantState::at_rest([0.0, 0.0, 0.0]);
        let u = [1.0, 0.0, 0.0];
        for _ in 0..5000 {
            state = advance(state, u, &params);
        }
        assert_relative_eq!(state.a[0], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn zero_command_from_rest_stays_at_rest() {
        let params = critically_damped(0.005);
        let state = PlantState::at_rest([1.0, 2.0, 3.0]);
        let next = advance(state, [0.0, 0.0, 0.0], &params);
        assert_relative_eq!(next.p[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(next.v[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn advance_is_deterministic() {
        let params = critically_damped(0.005);
        let state = PlantState::with_velocity([0.0, 0.0, 0.0], [0.1, -0.2, 0.3]);
        let u = [0.5, -0.5, 0.1];
        let a = advance(state, u, &params);
        let b = advance(state, u, &params);
        assert_eq!(a, b);
    }
}
