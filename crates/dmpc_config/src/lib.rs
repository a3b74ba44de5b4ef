//! The structured configuration document consumed at startup. JSON
//! configuration loading is assumed available as an external collaborator,
//! but the CLI still names a configuration file as its one argument and
//! enumerates every recognized key, so this crate implements it fully.

use std::path::Path;

use dmpc_avoidance::CollisionMethod;
use dmpc_bezier::BezierParams;
use dmpc_linalg::{Ellipse, Point3};
use dmpc_qp::{CostWeights, LimitBounds};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse configuration document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// `solver ∈ { qpoases }` is the one recognized document value; the
/// backend actually wired up behind it is `clarabel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    #[default]
    Clarabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    #[default]
    Default,
    Random,
}

/// A goal's motion profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "motion_type", rename_all = "snake_case")]
pub enum MotionProfile {
    Static,
    Translation { velocity: Point3 },
    Circular { radius: f64, omega: f64 },
}

impl Default for MotionProfile {
    fn default() -> Self {
        MotionProfile::Static
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionGeometryConfig {
    pub order: i32,
    pub rmin: f64,
    pub height_scaling: f64,
    pub order_obs: i32,
    pub rmin_obs: f64,
    pub height_scaling_obs: f64,
}

impl CollisionGeometryConfig {
    #[must_use]
    pub fn commanded_ellipse(&self) -> Ellipse {
        Ellipse::new(self.order, self.rmin, self.height_scaling)
    }

    #[must_use]
    pub fn obstacle_ellipse(&self) -> Ellipse {
        Ellipse::new(self.order_obs, self.rmin_obs, self.height_scaling_obs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    pub std_position: f64,
    pub std_velocity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReallocationConfig {
    pub reallocation_enabled: bool,
    pub reallocation_period: f64,
    #[serde(rename = "_use_predictive")]
    pub use_predictive: bool,
    pub prediction_horizon: f64,
    /// `true` fires the first event at `t == 0` (`last_time = -period`),
    /// `false` at `t == period` (`last_time = 0.0`).
    #[serde(default = "default_true")]
    pub start_immediately: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    pub collision_check_rmin: f64,
    pub collision_check_order: i32,
    pub collision_check_height_scaling: f64,
    pub goal_tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub simulation_duration: f64,
    pub output_trajectories_paths: Vec<String>,
    pub output_goals_paths: Vec<String>,
    /// Not part of the documented "duration + outputs" key list, but the
    /// reallocation log format is separately specified, so this fills in
    /// the obvious companion path.
    #[serde(default = "default_realloc_log_path")]
    pub reallocation_log_path: String,
}

fn default_realloc_log_path() -> String {
    "reallocation_log.csv".to_string()
}

/// The full recognized-key document, as one flat JSON object: the grouped
/// key listing ("Bézier:", "Model:", "MPC:", ...) is a prose grouping, not
/// nested objects, so we take the flat reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "N")]
    pub n: usize,
    #[serde(rename = "Ncmd")]
    pub n_cmd: usize,
    pub po: Vec<Point3>,
    pub pf: Vec<Point3>,

    pub solver: Solver,
    pub collision_method: CollisionMethod,

    pub d: usize,
    pub num_segments: usize,
    pub dim: usize,
    pub deg_poly: usize,
    pub t_segment: f64,

    pub zeta_xy: f64,
    pub tau_xy: f64,
    pub zeta_z: f64,
    pub tau_z: f64,

    pub h: f64,
    pub ts: f64,
    pub k_hor: usize,
    pub weights: CostWeights,
    pub limits: LimitBounds,

    #[serde(flatten)]
    pub collision_geometry: CollisionGeometryConfig,

    #[serde(flatten)]
    pub noise: NoiseConfig,

    pub test: TestMode,

    #[serde(flatten)]
    pub motion: MotionProfile,

    #[serde(flatten)]
    pub reallocation: ReallocationConfig,

    #[serde(flatten)]
    pub audit: AuditConfig,

    #[serde(flatten)]
    pub output: OutputConfig,
}

impl Config {
    /// A fully-populated, runnable default configuration document: the
    /// antipodal-swap scenario, two commanded agents crossing along `x`.
    /// Backs the CLI's `--dump-default-config` flag.
    #[must_use]
    pub fn default_document() -> Self {
        Self {
            n: 2,
            n_cmd: 2,
            po: vec![[0.0, 0.0, 1.0], [4.0, 0.0, 1.0]],
            pf: vec![[4.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
            solver: Solver::Clarabel,
            collision_method: CollisionMethod::OnDemand,
            d: 5,
            num_segments: 3,
            dim: 3,
            deg_poly: 3,
            t_segment: 1.0,
            zeta_xy: 1.0,
            tau_xy: 0.05,
            zeta_z: 1.0,
            tau_z: 0.05,
            h: 0.2,
            ts: 0.005,
            k_hor: 16,
            weights: CostWeights {
                s_free: 10.0,
                s_obs: 20.0,
                s_repel: 40.0,
                spd_f: 1.0,
                spd_o: 2.0,
                spd_r: 4.0,
                acc_cost: 0.1,
                lin_coll: 1000.0,
                quad_coll: 1000.0,
            },
            limits: LimitBounds {
                p_min: [-10.0, -10.0, 0.0],
                p_max: [10.0, 10.0, 5.0],
                a_min: [-3.0, -3.0, -3.0],
                a_max: [3.0, 3.0, 3.0],
            },
            collision_geometry: CollisionGeometryConfig {
                order: 2,
                rmin: 0.5,
                height_scaling: 2.0,
                order_obs: 2,
                rmin_obs: 0.8,
                height_scaling_obs: 1.0,
            },
            noise: NoiseConfig {
                std_position: 0.001,
                std_velocity: 0.001,
            },
            test: TestMode::Default,
            motion: MotionProfile::Static,
            reallocation: ReallocationConfig {
                reallocation_enabled: true,
                reallocation_period: 2.0,
                use_predictive: false,
                prediction_horizon: 1.0,
                start_immediately: true,
            },
            audit: AuditConfig {
                collision_check_rmin: 0.5,
                collision_check_order: 2,
                collision_check_height_scaling: 2.0,
                goal_tolerance: 0.1,
            },
            output: OutputConfig {
                simulation_duration: 10.0,
                output_trajectories_paths: vec!["out/traj.txt".to_string()],
                output_goals_paths: vec!["out/goals.txt".to_string()],
                reallocation_log_path: default_realloc_log_path(),
            },
        }
    }

    /// Maps the Bézier-shaped subset of the document to `dmpc_bezier`'s
    /// parameter struct.
    #[must_use]
    pub fn bezier_params(&self) -> BezierParams {
        BezierParams {
            degree: self.d,
            num_segments: self.num_segments,
            dim: self.dim,
            deg_poly: self.deg_poly,
            t_segment: self.t_segment,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.n_cmd > self.n {
            return Err(ConfigError::Validation(format!(
                "Ncmd ({}) must be <= N ({})",
                self.n_cmd, self.n
            )));
        }
        if self.po.len() != self.n {
            return Err(ConfigError::Validation(format!(
                "po has {} entries, expected N = {}",
                self.po.len(),
                self.n
            )));
        }
        if self.pf.len() != self.n_cmd {
            return Err(ConfigError::Validation(format!(
                "pf has {} entries, expected Ncmd = {}",
                self.pf.len(),
                self.n_cmd
            )));
        }
        if self.deg_poly >= self.d {
            return Err(ConfigError::Validation(format!(
                "deg_poly ({}) must be < d ({})",
                self.deg_poly, self.d
            )));
        }
        if self.h <= 0.0 || self.ts <= 0.0 || self.h < self.ts {
            return Err(ConfigError::Validation(
                "h and ts must be positive with h >= ts".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads and validates the configuration document at `path`. A malformed
/// or invalid document is a fatal startup error.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: Config = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "N": 2, "Ncmd": 2,
            "po": [[0,0,1],[4,0,1]], "pf": [[4,0,1],[0,0,1]],
            "solver": "clarabel", "collision_method": "ONDemand",
            "d": 5, "num_segments": 3, "dim": 3, "deg_poly": 3, "t_segment": 1.0,
            "zeta_xy": 1.0, "tau_xy": 0.05, "zeta_z": 1.0, "tau_z": 0.05,
            "h": 0.2, "ts": 0.005, "k_hor": 16,
            "weights": {"s_free":10,"s_obs":20,"s_repel":40,"spd_f":1,"spd_o":2,"spd_r":4,"acc_cost":0.1,"lin_coll":1000,"quad_coll":1000},
            "limits": {"p_min":[-10,-10,0],"p_max":[10,10,5],"a_min":[-3,-3,-3],"a_max":[3,3,3]},
            "order": 2, "rmin": 0.5, "height_scaling": 2.0,
            "order_obs": 2, "rmin_obs": 0.8, "height_scaling_obs": 1.0,
            "std_position": 0.001, "std_velocity": 0.001,
            "test": "default",
            "motion_type": "static",
            "reallocation_enabled": true, "reallocation_period": 2.0,
            "_use_predictive": false, "prediction_horizon": 1.0,
            "collision_check_rmin": 0.5, "collision_check_order": 2,
            "collision_check_height_scaling": 2.0, "goal_tolerance": 0.1,
            "simulation_duration": 10.0,
            "output_trajectories_paths": ["out/traj.txt"],
            "output_goals_paths": ["out/goals.txt"]
        }"#
    }

    #[test]
    fn parses_the_documented_recognized_keys() {
        let config: Config = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(config.n, 2);
        assert_eq!(config.n_cmd, 2);
        assert_eq!(config.solver, Solver::Clarabel);
        assert_eq!(config.collision_method, CollisionMethod::OnDemand);
        assert!(config.reallocation.start_immediately);
        assert_eq!(config.output.reallocation_log_path, "reallocation_log.csv");
        config.validate().unwrap();
    }

    #[test]
    fn parses_bvc_collision_method() {
        let json = sample_json().replace("\"ONDemand\"", "\"BVC\"");
        let config: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config.collision_method, CollisionMethod::Bvc);
    }

    #[test]
    fn rejects_mismatched_goal_count() {
        let mut config: Config = serde_json::from_str(sample_json()).unwrap();
        config.pf.push([0.0, 0.0, 0.0]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_ncmd_greater_than_n() {
        let mut config: Config = serde_json::from_str(sample_json()).unwrap();
        config.n_cmd = config.n + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_document_validates_and_round_trips_through_json() {
        let config = Config::default_document();
        config.validate().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let reparsed: Config = serde_json::from_str(&json).unwrap();
        reparsed.validate().unwrap();
        assert_eq!(reparsed.n, config.n);
        assert_eq!(reparsed.collision_method, config.collision_method);
    }
}
