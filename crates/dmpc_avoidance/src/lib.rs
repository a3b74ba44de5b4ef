//! The two interchangeable collision-avoidance constraint builders:
//! On-Demand and Buffered Voronoi Cells (BVC).
//!
//! Both reduce the non-convex ellipsoidal separation `d_ij >= r_min` to one
//! linearized half-plane per `(i, j, k)` triple that currently (On-Demand)
//! or proactively (BVC) violates a threshold; the only difference is that
//! threshold. Iteration order is `k` outer, `j` inner.

use dmpc_linalg::{Ellipse, Horizon};
use dmpc_qp::CollisionConstraint;
use serde::{Deserialize, Serialize};

/// BVC's safety dilation factor on `r_min`.
pub const BVC_ALPHA: dmpc_linalg::Float = 3.0;

/// Selected once at construction time; all agents in a run use the same
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CollisionMethod {
    #[serde(rename = "ONDemand")]
    OnDemand,
    #[serde(rename = "BVC")]
    Bvc,
}

/// The ellipsoidal footprints needed to linearize a pair: commanded agents
/// share one footprint, static uncommanded agents (indices `>= n_cmd`) use
/// a separate, usually more conservative, footprint.
#[derive(Debug, Clone, Copy)]
pub struct AvoidanceGeometry {
    pub commanded: Ellipse,
    pub obstacle: Ellipse,
    pub n_cmd: usize,
}

impl AvoidanceGeometry {
    fn ellipse_for_pair(&self, i: usize, j: usize) -> Ellipse {
        if i >= self.n_cmd || j >= self.n_cmd {
            self.obstacle
        } else {
            self.commanded
        }
    }
}

/// Enumerates neighbor-timestep pairs against agent `agent_index`'s
/// previous horizon and emits one linearized half-plane per violating
/// pair. `horizons[agent_index]` is the linearization point; `horizons[j]`
/// for `j != agent_index` are the frozen snapshots of other agents.
#[must_use]
pub fn build_constraints(
    method: CollisionMethod,
    agent_index: usize,
    horizons: &[Horizon],
    geometry: &AvoidanceGeometry,
) -> Vec<CollisionConstraint> {
    let own = &horizons[agent_index];
    let k_hor = own.len();
    let mut constraints = Vec::new();

    for k in 0..k_hor {
        let p_i = own[k];
        for (j, other) in horizons.iter().enumerate() {
            if j == agent_index {
                continue;
            }
            let Some(&p_j) = other.get(k) else {
                continue;
            };
            let ellipse = geometry.ellipse_for_pair(agent_index, j);
            let threshold = match method {
                CollisionMethod::OnDemand => ellipse.r_min,
                CollisionMethod::Bvc => BVC_ALPHA * ellipse.r_min,
            };

            let distance = ellipse.distance(p_i, p_j);
            if distance >= threshold {
                continue;
            }

            let lin = ellipse.linearize(p_i, p_j);
            let d = lin.distance;
            let g = lin.gradient;
            let q = ellipse.order as dmpc_linalg::Float;
            let d_pow = d.powf(q - 1.0);

            let g_dot_p = dmpc_linalg::dot3(g, p_i);
            let rhs = -d_pow * (ellipse.r_min - d) - g_dot_p;

            constraints.push(CollisionConstraint {
                step: k,
                gradient: g,
                rhs_offset: rhs,
                slack_coefficient: d_pow,
            });
        }
    }

    constraints
}
