//! The task reallocation loop: a periodic minimum-cost bipartite rematch
//! between agents and goals, reactive or predictive, that pushes changes
//! into the Generator without ever touching agent state or predicted
//! horizons directly.

mod hungarian;

pub use hungarian::min_cost_assignment;

use dmpc_linalg::{Float, Horizon, Point3};

/// Reactive uses current position; predictive samples the previous
/// predicted horizon at a fixed lookahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReallocationMode {
    Reactive,
    Predictive,
}

/// One changed assignment, as logged to the reallocation log.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentChange {
    pub agent: usize,
    pub old_goal: usize,
    pub new_goal: usize,
    pub distance: Float,
}

/// The outcome of a reallocation tick that actually changed the
/// assignment.
#[derive(Debug, Clone)]
pub struct ReallocationEvent {
    pub id: u64,
    pub changes: Vec<AssignmentChange>,
    pub assignment: Vec<usize>,
}

/// Drives the reallocation state machine: `Idle -> (t - t_last >= period)
/// -> Sample -> Solve -> {unchanged -> Idle, changed -> Commit -> Idle}`.
#[derive(Debug, Clone)]
pub struct Reallocator {
    period: Float,
    mode: ReallocationMode,
    lookahead: Float,
    last_time: Float,
    assignment: Vec<usize>,
    next_id: u64,
}

impl Reallocator {
    /// `start_immediately` picks between initializing the first
    /// reallocation time to `-period` (first event fires at `t == 0`) or to
    /// `0.0` (first event fires at `t == period`); exposed as an explicit
    /// config knob instead of hardcoding one.
    #[must_use]
    pub fn new(
        period: Float,
        mode: ReallocationMode,
        lookahead: Float,
        n_cmd: usize,
        start_immediately: bool,
    ) -> Self {
        Self {
            period,
            mode,
            lookahead,
            last_time: if start_immediately { -period } else { 0.0 },
            assignment: (0..n_cmd).collect(),
            next_id: 0,
        }
    }

    #[must_use]
    pub fn current_assignment(&self) -> &[usize] {
        &self.assignment
    }

    #[must_use]
    pub fn mode(&self) -> ReallocationMode {
        self.mode
    }

    #[must_use]
    pub fn is_due(&self, t: Float) -> bool {
        t - self.last_time >= self.period
    }

    /// Builds the reactive or predictive cost matrix, solves the minimum
    /// cost perfect matching, and — if the result differs from the last
    /// committed assignment — returns the changes to publish.
    ///
    /// `ts` is the dynamics step used to convert the predictive lookahead
    /// time into a horizon index (`k* = round(T_pred / Ts)`, clamped to the
    /// last horizon column).
    #[must_use]
    pub fn reallocate(
        &mut self,
        t: Float,
        positions: &[Point3],
        horizons: &[Horizon],
        goals: &[Point3],
        ts: Float,
    ) -> Option<ReallocationEvent> {
        if !self.is_due(t) {
            return None;
        }
        self.last_time = t;

        let n = goals.len();
        let sample_points: Vec<Point3> = match self.mode {
            ReallocationMode::Reactive => positions.to_vec(),
            ReallocationMode::Predictive => {
                let k_star = (self.lookahead / ts).round() as usize;
                horizons
                    .iter()
                    .map(|h| {
                        let idx = k_star.min(h.len().saturating_sub(1));
                        h.get(idx).copied().unwrap_or([0.0, 0.0, 0.0])
                    })
                    .collect()
            }
        };

        let mut cost = vec![vec![0.0_f64; n]; n];
        for (i, p) in sample_points.iter().enumerate() {
            for (j, g) in goals.iter().enumerate() {
                let d = dmpc_linalg::dot3(
                    [p[0] - g[0], p[1] - g[1], p[2] - g[2]],
                    [p[0] - g[0], p[1] - g[1], p[2] - g[2]],
                )
                .sqrt();
                cost[i][j] = d;
            }
        }

        let new_assignment = min_cost_assignment(&cost);

        let changes: Vec<AssignmentChange> = (0..n)
            .filter(|&i| new_assignment[i] != self.assignment[i])
            .map(|i| AssignmentChange {
                agent: i,
                old_goal: self.assignment[i],
                new_goal: new_assignment[i],
                distance: cost[i][new_assignment[i]],
            })
            .collect();

        if changes.is_empty() {
            return None;
        }

        self.assignment = new_assignment.clone();
        let id = self.next_id;
        self.next_id += 1;
        for change in &changes {
            tracing::info!(
                t,
                realloc_id = id,
                agent = change.agent,
                old_goal = change.old_goal,
                new_goal = change.new_goal,
                distance = change.distance,
                mode = ?self.mode,
                "reallocation changed an agent's goal"
            );
        }
        Some(ReallocationEvent {
            id,
            changes,
            assignment: new_assignment,
        })
    }
}
