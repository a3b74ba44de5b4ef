//! Constant Bézier sampling and continuity matrices. Everything here is
//! fixed for the lifetime of a run: it depends only on the Bézier curve
//! shape (`degree`, `num_segments`,
//! `deg_poly`, `t_segment`) and the prediction horizon (`k_hor`, `h`), never
//! on an agent's current state.

use dmpc_linalg::{Float, Matrix};
use ndarray::{s, Array1, Array2};

/// Shape of the piecewise Bézier trajectory: `num_segments` curves of
/// `degree` each, stitched with continuity up to `deg_poly` derivatives.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BezierParams {
    pub degree: usize,
    pub num_segments: usize,
    pub dim: usize,
    pub deg_poly: usize,
    pub t_segment: Float,
}

impl BezierParams {
    fn control_points_per_dim(&self) -> usize {
        (self.degree + 1) * self.num_segments
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BezierError {
    #[error("deg_poly ({deg_poly}) must be < degree ({degree}) to admit a continuity constraint")]
    DegPolyTooHigh { deg_poly: usize, degree: usize },
    #[error("num_segments must be >= 1")]
    NoSegments,
    #[error("t_segment must be > 0")]
    NonPositiveSegmentSpan,
}

fn binomial(n: usize, k: usize) -> Float {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    let mut result = 1.0;
    for i in 0..k {
        result = result * (n - i) as Float / (i + 1) as Float;
    }
    result
}

/// The degree-`n` Bernstein basis evaluated at `s`, as a `(n+1)`-row vector.
fn bernstein_row(n: usize, s: Float) -> Array1<Float> {
    Array1::from_iter((0..=n).map(|i| binomial(n, i) * s.powi(i as i32) * (1.0 - s).powi((n - i) as i32)))
}

/// Maps the `(n+1)` control points of a degree-`n` Bézier curve to the `n`
/// control points of its (unscaled, w.r.t. local parameter `s`) derivative
/// curve: `row i` is `-n` at column `i` and `+n` at column `i + 1`.
fn difference_operator(n: usize) -> Array2<Float> {
    let mut d = Array2::<Float>::zeros((n, n + 1));
    for i in 0..n {
        d[[i, i]] = -(n as Float);
        d[[i, i + 1]] = n as Float;
    }
    d
}

/// The raw (unscaled) `r`-th forward difference row over `r + 1` control
/// points: `sum_{j=0}^{r} (-1)^{r-j} C(r,j) P_j`.
fn raw_difference_row(r: usize) -> Array1<Float> {
    Array1::from_iter((0..=r).map(|j| {
        let sign = if (r - j) % 2 == 0 { 1.0 } else { -1.0 };
        sign * binomial(r, j)
    }))
}

fn factorial(n: usize) -> Float {
    (1..=n).map(|i| i as Float).product::<Float>().max(1.0)
}

/// Repeats `m` block-diagonally `times` times, the standard way to lift a
/// per-dimension scalar basis matrix to the full `dim`-interleaved decision
/// vector (decision variables are the control points, shape
/// `3 x ((d+1)*n_s)`).
fn block_diag_repeat(m: &Array2<Float>, times: usize) -> Array2<Float> {
    let (rows, cols) = m.dim();
    let mut out = Array2::<Float>::zeros((rows * times, cols * times));
    for t in 0..times {
        out.slice_mut(s![t * rows..(t + 1) * rows, t * cols..(t + 1) * cols])
            .assign(m);
    }
    out
}

/// The constant matrices derived from a Bézier curve shape and a prediction
/// horizon: `Φ_pos`, `Φ_vel`, `Φ_acc` (one block-diagonal matrix per axis),
/// the inter-segment continuity block `A_eq^cont`, and the energy weighting
/// `Q_E`.
#[derive(Debug, Clone)]
pub struct BezierBasis {
    pub params: BezierParams,
    pub k_hor: usize,
    pub h: Float,
    /// `(dim * k_hor) x (dim * control_points_per_dim)`
    pub phi_pos: Matrix<Float>,
    pub phi_vel: Matrix<Float>,
    pub phi_acc: Matrix<Float>,
    /// `(dim * n_joints * (deg_poly + 1)) x (dim * control_points_per_dim)`
    pub continuity: Matrix<Float>,
    /// `(dim * control_points_per_dim) x (dim * control_points_per_dim)`,
    /// penalizes the `degree`-th derivative (minimum-energy term of C2).
    pub energy: Matrix<Float>,
    /// Number of decision-vector columns per axis, `(degree + 1) *
    /// num_segments`.
    pub control_points_per_dim: usize,
}

impl BezierBasis {
    pub fn new(params: BezierParams, k_hor: usize, h: Float) -> Result<Self, BezierError> {
        if params.num_segments == 0 {
            return Err(BezierError::NoSegments);
        }
        if params.t_segment <= 0.0 {
            return Err(BezierError::NonPositiveSegmentSpan);
        }
        if params.deg_poly >= params.degree {
            return Err(BezierError::DegPolyTooHigh {
                deg_poly: params.deg_poly,
                degree: params.degree,
            });
        }

        let d = params.degree;
        let n_cp = params.control_points_per_dim();

        let vel_operator = difference_operator(d);
        let acc_operator = if d >= 2 {
            difference_operator(d - 1).dot(&vel_operator)
        } else {
            Array2::zeros((0, d + 1))
        };

        let mut pos_scalar = Array2::<Float>::zeros((k_hor, n_cp));
        let mut vel_scalar = Array2::<Float>::zeros((k_hor, n_cp));
        let mut acc_scalar = Array2::<Float>::zeros((k_hor, n_cp));

        for k in 0..k_hor {
            let t = k as Float * h;
            let total_span = params.t_segment * params.num_segments as Float;
            let t_clamped = t.clamp(0.0, total_span);
            let mut seg = (t_clamped / params.t_segment).floor() as usize;
            seg = seg.min(params.num_segments - 1);
            let local_t = t_clamped - seg as Float * params.t_segment;
            let s = (local_t / params.t_segment).clamp(0.0, 1.0);

            let col_offset = seg * (d + 1);

            let pos_row = bernstein_row(d, s);
            pos_scalar
                .slice_mut(s![k, col_offset..col_offset + d + 1])
                .assign(&pos_row);

            let vel_row = bernstein_row(d - 1, s).dot(&vel_operator) / params.t_segment;
            vel_scalar
                .slice_mut(s![k, col_offset..col_offset + d + 1])
                .assign(&vel_row);

            if d >= 2 {
                let acc_row =
                    bernstein_row(d - 2, s).dot(&acc_operator) / (params.t_segment * params.t_segment);
                acc_scalar
                    .slice_mut(s![k, col_offset..col_offset + d + 1])
                    .assign(&acc_row);
            }
        }

        let joints = params.num_segments.saturating_sub(1);
        let rows_per_joint = params.deg_poly + 1;
        let mut continuity_scalar = Array2::<Float>::zeros((joints * rows_per_joint, n_cp));
        for joint in 0..joints {
            let left_offset = joint * (d + 1);
            let right_offset = (joint + 1) * (d + 1);
            for r in 0..rows_per_joint {
                let row_idx = joint * rows_per_joint + r;
                let diff = raw_difference_row(r);
                // Last r+1 control points of the left segment.
                continuity_scalar
                    .slice_mut(s![row_idx, left_offset + d - r..=left_offset + d])
                    .assign(&diff);
                // First r+1 control points of the right segment, negated.
                continuity_scalar
                    .slice_mut(s![row_idx, right_offset..=right_offset + r])
                    .scaled_add(-1.0, &diff);
            }
        }

        let scale = factorial(d) / params.t_segment.powi(d as i32);
        let mut energy_scalar = Array2::<Float>::zeros((params.num_segments, n_cp));
        let full_diff = raw_difference_row(d) * scale;
        for seg in 0..params.num_segments {
            let offset = seg * (d + 1);
            energy_scalar
                .slice_mut(s![seg, offset..=offset + d])
                .assign(&full_diff);
        }
        let energy_scalar = energy_scalar.t().dot(&energy_scalar);

        Ok(Self {
            control_points_per_dim: n_cp,
            phi_pos: block_diag_repeat(&pos_scalar, params.dim),
            phi_vel: block_diag_repeat(&vel_scalar, params.dim),
            phi_acc: block_diag_repeat(&acc_scalar, params.dim),
            continuity: block_diag_repeat(&continuity_scalar, params.dim),
            energy: block_diag_repeat(&energy_scalar, params.dim),
            params,
            k_hor,
            h,
        })
    }

    /// Total number of decision-vector columns (`dim * control_points_per_dim`).
    #[must_use]
    pub fn decision_vector_len(&self) -> usize {
        self.params.dim * self.control_points_per_dim
    }
}
