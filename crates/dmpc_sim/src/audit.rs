//! Post-run collision and goal-reached audits: reported to stdout by the
//! caller, never aborting the run.

use dmpc_linalg::{Ellipse, Float, Point3};

/// One pairwise separation violation found by [`audit_collisions`].
#[derive(Debug, Clone, Copy)]
pub struct CollisionViolation {
    pub step: usize,
    pub agent_a: usize,
    pub agent_b: usize,
    pub distance: Float,
}

/// One agent that never reached its final goal within tolerance, found by
/// [`audit_goals_reached`].
#[derive(Debug, Clone, Copy)]
pub struct GoalMiss {
    pub agent: usize,
    pub final_distance: Float,
    pub tolerance: Float,
}

/// Scans every logged step of every commanded-agent pair for ellipsoidal
/// separation under `ellipse.r_min`. `trajectories[agent][step]` must all
/// share the same length.
#[must_use]
pub fn audit_collisions(trajectories: &[Vec<Point3>], ellipse: &Ellipse) -> Vec<CollisionViolation> {
    let mut violations = Vec::new();
    if trajectories.is_empty() {
        return violations;
    }
    let steps = trajectories[0].len();
    for step in 0..steps {
        for a in 0..trajectories.len() {
            for b in (a + 1)..trajectories.len() {
                let Some(&p_a) = trajectories[a].get(step) else {
                    continue;
                };
                let Some(&p_b) = trajectories[b].get(step) else {
                    continue;
                };
                let d = ellipse.distance(p_a, p_b);
                if d < ellipse.r_min {
                    violations.push(CollisionViolation {
                        step,
                        agent_a: a,
                        agent_b: b,
                        distance: d,
                    });
                }
            }
        }
    }
    violations
}

/// Flags every commanded agent whose final logged position is farther than
/// `tolerance` from its final goal position.
#[must_use]
pub fn audit_goals_reached(
    final_positions: &[Point3],
    final_goals: &[Point3],
    tolerance: Float,
) -> Vec<GoalMiss> {
    final_positions
        .iter()
        .zip(final_goals.iter())
        .enumerate()
        .filter_map(|(agent, (&p, &g))| {
            let d = dmpc_linalg::dot3(
                [p[0] - g[0], p[1] - g[1], p[2] - g[2]],
                [p[0] - g[0], p[1] - g[1], p[2] - g[2]],
            )
            .sqrt();
            (d > tolerance).then_some(GoalMiss {
                agent,
                final_distance: d,
                tolerance,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_violations_when_well_separated() {
        let ellipse = Ellipse::new(2, 0.5, 1.5);
        let trajectories = vec![
            vec![[0.0, 0.0, 0.0], [0.0, 0.0, 0.0]],
            vec![[10.0, 0.0, 0.0], [10.0, 0.0, 0.0]],
        ];
        assert!(audit_collisions(&trajectories, &ellipse).is_empty());
    }

    #[test]
    fn flags_a_violating_step() {
        let ellipse = Ellipse::new(2, 0.5, 1.5);
        let trajectories = vec![
            vec![[0.0, 0.0, 0.0], [0.0, 0.0, 0.0]],
            vec![[10.0, 0.0, 0.0], [0.1, 0.0, 0.0]],
        ];
        let violations = audit_collisions(&trajectories, &ellipse);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].step, 1);
    }

    #[test]
    fn flags_agent_outside_goal_tolerance() {
        let misses = audit_goals_reached(
            &[[0.0, 0.0, 0.0], [5.0, 5.0, 5.0]],
            &[[0.05, 0.0, 0.0], [0.0, 0.0, 0.0]],
            0.1,
        );
        assert_eq!(misses.len(), 1);
        assert_eq!(misses[0].agent, 1);
    }
}
