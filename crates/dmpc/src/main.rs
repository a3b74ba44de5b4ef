//! CLI entry point: loads the configuration document, wires `dmpc_config`
//! into `dmpc_sim`, runs the simulation, writes the documented output
//! files, and reports the post-run audits to stdout.

mod cli;

use std::path::Path;

use anyhow::Context;
use dmpc_assignment::{ReallocationMode, Reallocator};
use dmpc_avoidance::{AvoidanceGeometry, CollisionMethod};
use dmpc_bezier::BezierBasis;
use dmpc_config::Config;
use dmpc_dynamics::{AxisParams, DynamicsParams, PlantState};
use dmpc_linalg::{Ellipse, Point3};
use dmpc_sim::{
    audit_collisions, audit_goals_reached, random_points, write_goal_file, write_trajectory_file,
    Generator, NoiseParams, ReallocationLog, Simulator, SimulatorParams,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Minimum separation margin added to `rmin` for `test = "random"` scenario
/// generation; not a named configuration key, so fixed here rather than
/// invented as a new recognized key.
const RANDOM_SCENARIO_MARGIN: f64 = 0.1;
const RANDOM_SCENARIO_MAX_ATTEMPTS: usize = 200_000;

fn main() -> anyhow::Result<()> {
    let cli = cli::parse_arguments();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if cli.dump_default_config {
        let config = Config::default_document();
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let config_path = cli
        .config
        .context("a configuration file path is required unless --dump-default-config is set")?;
    let config = dmpc_config::load_config(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);

    let po = resolve_initial_positions(&config, &mut rng)?;

    run_simulation(&config, po, rng)
}

fn resolve_initial_positions(config: &Config, rng: &mut ChaCha8Rng) -> anyhow::Result<Vec<Point3>> {
    match config.test {
        dmpc_config::TestMode::Default => Ok(config.po.clone()),
        dmpc_config::TestMode::Random => {
            let min_separation = config.collision_geometry.rmin + RANDOM_SCENARIO_MARGIN;
            random_points(
                rng,
                config.n,
                config.limits.p_min,
                config.limits.p_max,
                min_separation,
                RANDOM_SCENARIO_MAX_ATTEMPTS,
            )
            .map_err(anyhow::Error::from)
        }
    }
}

fn run_simulation(config: &Config, po: Vec<Point3>, rng: ChaCha8Rng) -> anyhow::Result<()> {
    let basis = BezierBasis::new(config.bezier_params(), config.k_hor, config.h)?;

    let geometry = AvoidanceGeometry {
        commanded: config.collision_geometry.commanded_ellipse(),
        obstacle: config.collision_geometry.obstacle_ellipse(),
        n_cmd: config.n_cmd,
    };
    let solver = dmpc_sim::AgentSolver::new(basis, config.weights, config.limits, geometry, config.collision_method);

    let commanded_positions = &po[..config.n_cmd];
    let obstacle_positions = &po[config.n_cmd..];
    let initial_assignment: Vec<usize> = (0..config.n_cmd).collect();

    let generator = Generator::new(
        solver,
        config.n_cmd,
        config.pf.clone(),
        config.motion,
        initial_assignment,
        commanded_positions,
        obstacle_positions,
    );

    let reallocator = config.reallocation.reallocation_enabled.then(|| {
        let mode = if config.reallocation.use_predictive {
            ReallocationMode::Predictive
        } else {
            ReallocationMode::Reactive
        };
        Reallocator::new(
            config.reallocation.reallocation_period,
            mode,
            config.reallocation.prediction_horizon,
            config.n_cmd,
            config.reallocation.start_immediately,
        )
    });

    let axis_xy = AxisParams { zeta: config.zeta_xy, tau: config.tau_xy };
    let axis_z = AxisParams { zeta: config.zeta_z, tau: config.tau_z };
    let dynamics = DynamicsParams { xy: axis_xy, z: axis_z, ts: config.ts };

    let initial_states: Vec<PlantState> = commanded_positions
        .iter()
        .map(|&p| PlantState::at_rest(p))
        .collect();

    let sim_params = SimulatorParams {
        ts: config.ts,
        h: config.h,
        noise: NoiseParams {
            std_position: config.noise.std_position,
            std_velocity: config.noise.std_velocity,
        },
        reallocation_enabled: config.reallocation.reallocation_enabled,
    };

    let mut simulator = Simulator::new(sim_params, dynamics, generator, reallocator, initial_states, rng);

    let mut reallocation_log = ReallocationLog::create(&config.output.reallocation_log_path)
        .with_context(|| format!("opening reallocation log at {}", config.output.reallocation_log_path))?;

    simulator.run(config.output.simulation_duration, Some(&mut reallocation_log));

    write_outputs(config, &po, &simulator)?;
    run_audits(config, &simulator);

    Ok(())
}

fn write_outputs(config: &Config, po: &[Point3], simulator: &Simulator<ChaCha8Rng>) -> anyhow::Result<()> {
    if config.output.output_trajectories_paths.is_empty() {
        anyhow::bail!("output_trajectories_paths must name at least one path");
    }
    if config.output.output_goals_paths.is_empty() {
        anyhow::bail!("output_goals_paths must name at least one path");
    }

    for trajectory_path in &config.output.output_trajectories_paths {
        ensure_parent_dir(trajectory_path)?;
        write_trajectory_file(
            trajectory_path,
            config.n,
            config.n_cmd,
            config.limits.p_min,
            config.limits.p_max,
            po,
            &config.pf,
            simulator.trajectory_log(),
        )
        .with_context(|| format!("writing trajectory file to {trajectory_path}"))?;
    }

    for goal_path in &config.output.output_goals_paths {
        ensure_parent_dir(goal_path)?;
        write_goal_file(goal_path, simulator.goal_log())
            .with_context(|| format!("writing goal file to {goal_path}"))?;
    }

    Ok(())
}

fn ensure_parent_dir(path: &str) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn run_audits(config: &Config, simulator: &Simulator<ChaCha8Rng>) {
    let ellipse = Ellipse::new(
        config.audit.collision_check_order,
        config.audit.collision_check_rmin,
        config.audit.collision_check_height_scaling,
    );
    let violations = audit_collisions(simulator.trajectory_log(), &ellipse);
    if violations.is_empty() {
        println!("collision audit: no violations over {} commanded agents", config.n_cmd);
    } else {
        println!("collision audit: {} violations found", violations.len());
        for v in &violations {
            println!(
                "  step {}: agents {} and {} at ellipsoidal distance {:.4} (< {:.4})",
                v.step, v.agent_a, v.agent_b, v.distance, config.audit.collision_check_rmin
            );
        }
    }

    let final_positions: Vec<Point3> = simulator
        .trajectory_log()
        .iter()
        .map(|log| *log.last().unwrap_or(&[0.0, 0.0, 0.0]))
        .collect();
    let final_goals: Vec<Point3> = (0..config.n_cmd)
        .map(|i| simulator.goal_log()[i].last().copied().unwrap_or(config.pf[i]))
        .collect();
    let misses = audit_goals_reached(&final_positions, &final_goals, config.audit.goal_tolerance);
    if misses.is_empty() {
        println!("goal audit: every commanded agent within {:.4} of its goal", config.audit.goal_tolerance);
    } else {
        println!("goal audit: {} agents missed their goal tolerance", misses.len());
        for miss in &misses {
            println!(
                "  agent {} ended {:.4} from its goal (tolerance {:.4})",
                miss.agent, miss.final_distance, miss.tolerance
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ensure_parent_dir_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c/out.txt");
        ensure_parent_dir(nested.to_str().unwrap()).unwrap();
        assert!(nested.parent().unwrap().is_dir());
    }

    #[test]
    fn ensure_parent_dir_accepts_a_bare_filename() {
        assert!(ensure_parent_dir("out.txt").is_ok());
    }

    #[test]
    fn resolve_initial_positions_default_mode_returns_configured_po() {
        let mut config = dmpc_config::Config::default_document();
        config.test = dmpc_config::TestMode::Default;
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let po = resolve_initial_positions(&config, &mut rng).unwrap();
        assert_eq!(po, config.po);
    }

    #[test]
    fn resolve_initial_positions_random_mode_respects_separation() {
        let mut config = dmpc_config::Config::default_document();
        config.test = dmpc_config::TestMode::Random;
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let po = resolve_initial_positions(&config, &mut rng).unwrap();
        assert_eq!(po.len(), config.n);
        let min_separation = config.collision_geometry.rmin + RANDOM_SCENARIO_MARGIN;
        for i in 0..po.len() {
            for j in (i + 1)..po.len() {
                let d = dmpc_linalg::dot3(
                    [po[i][0] - po[j][0], po[i][1] - po[j][1], po[i][2] - po[j][2]],
                    [po[i][0] - po[j][0], po[i][1] - po[j][1], po[i][2] - po[j][2]],
                )
                .sqrt();
                assert!(d >= min_separation);
            }
        }
    }
}
