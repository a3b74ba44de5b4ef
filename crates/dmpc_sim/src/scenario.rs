//! Random scenario generation for `test = "random"`: placing `N` points in
//! the workspace with pairwise separation at least `r_min + margin`. The
//! generator can in principle loop unboundedly if `r_min` is set too large
//! relative to the workspace, so attempts are capped and the failure is an
//! explicit, fatal `GeometryError`, never an infinite loop.

use dmpc_linalg::{Float, Point3};
use rand::Rng;

#[derive(Debug, thiserror::Error)]
#[error("could not place {n} points with separation >= {min_separation} in the workspace within {attempts} attempts")]
pub struct GeometryError {
    pub n: usize,
    pub min_separation: Float,
    pub attempts: usize,
}

/// Places `n` points uniformly at random within `[p_min, p_max]`, rejecting
/// and retrying any candidate closer than `min_separation` to an already
/// placed point. Gives up after `max_attempts` total draws rather than
/// looping forever.
pub fn random_points<R: Rng>(
    rng: &mut R,
    n: usize,
    p_min: Point3,
    p_max: Point3,
    min_separation: Float,
    max_attempts: usize,
) -> Result<Vec<Point3>, GeometryError> {
    let mut points: Vec<Point3> = Vec::with_capacity(n);
    let mut attempts = 0usize;

    while points.len() < n {
        if attempts >= max_attempts {
            return Err(GeometryError {
                n,
                min_separation,
                attempts,
            });
        }
        attempts += 1;

        let candidate = [
            rng.gen_range(p_min[0]..=p_max[0]),
            rng.gen_range(p_min[1]..=p_max[1]),
            rng.gen_range(p_min[2]..=p_max[2]),
        ];
        let far_enough = points.iter().all(|&p| {
            let d = dmpc_linalg::dot3(
                [p[0] - candidate[0], p[1] - candidate[1], p[2] - candidate[2]],
                [p[0] - candidate[0], p[1] - candidate[1], p[2] - candidate[2]],
            )
            .sqrt();
            d >= min_separation
        });
        if far_enough {
            points.push(candidate);
        }
    }

    Ok(points)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn places_all_points_with_generous_workspace() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let points = random_points(&mut rng, 8, [-10.0; 3], [10.0; 3], 0.5, 100_000).unwrap();
        assert_eq!(points.len(), 8);
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                let d = dmpc_linalg::dot3(
                    [points[i][0] - points[j][0], points[i][1] - points[j][1], points[i][2] - points[j][2]],
                    [points[i][0] - points[j][0], points[i][1] - points[j][1], points[i][2] - points[j][2]],
                )
                .sqrt();
                assert!(d >= 0.5);
            }
        }
    }

    #[test]
    fn gives_up_explicitly_when_infeasible() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        // r_min far larger than the workspace can fit: must error, not hang.
        let result = random_points(&mut rng, 5, [-1.0; 3], [1.0; 3], 100.0, 200);
        assert!(result.is_err());
    }
}
