//! The standard-form QP and its convex solver backend.
//!
//! The configuration document names `solver ∈ { qpoases }` as its one
//! recognized value; no maintained Rust binding to qpOASES exists. We wire
//! up `clarabel`, a pure-Rust interior-point conic solver that natively
//! expresses convex QPs, as the real backend behind that config slot.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSolver, IPSolver, NonnegativeConeT, SolverStatus, SupportedConeT,
    ZeroConeT,
};
use dmpc_linalg::{Float, Matrix, Vector};

/// A quadratic program in the standard form used throughout this crate:
/// `minimize ½xᵀHx + fᵀx subject to A_eq x = b_eq, A_in x ≤ b_in`.
#[derive(Debug, Clone)]
pub struct QpProblem {
    pub h: Matrix<Float>,
    pub f: Vector<Float>,
    pub a_eq: Matrix<Float>,
    pub b_eq: Vector<Float>,
    pub a_in: Matrix<Float>,
    pub b_in: Vector<Float>,
}

/// Outcome of a solve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Solved,
    /// Infeasible or numerically degenerate; the caller must fall back to
    /// retaining the previous horizon and commanding zero acceleration.
    Failed,
}

#[derive(Debug, Clone)]
pub struct QpSolution {
    pub x: Vector<Float>,
    pub status: SolveStatus,
}

fn dense_to_csc(m: &Matrix<Float>) -> CscMatrix<Float> {
    let (rows, cols) = m.dim();
    let mut colptr = Vec::with_capacity(cols + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for j in 0..cols {
        for i in 0..rows {
            let v = m[[i, j]];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr.push(rowval.len());
    }
    CscMatrix::new(rows, cols, colptr, rowval, nzval)
}

/// The upper-triangular part of a symmetric `H`, as `clarabel` expects `P`.
fn dense_to_upper_triangular_csc(m: &Matrix<Float>) -> CscMatrix<Float> {
    let (rows, cols) = m.dim();
    let mut colptr = Vec::with_capacity(cols + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for j in 0..cols {
        for i in 0..=j.min(rows.saturating_sub(1)) {
            let v = m[[i, j]];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr.push(rowval.len());
    }
    CscMatrix::new(rows, cols, colptr, rowval, nzval)
}

/// Solves `problem` with `clarabel`. Never panics: an infeasible or
/// numerically failed solve is reported as `SolveStatus::Failed` with `x`
/// left as zeros, so callers can apply their soft fallback without matching
/// on solver-internal error types.
#[must_use]
pub fn solve(problem: &QpProblem) -> QpSolution {
    let n = problem.f.len();
    let n_eq = problem.b_eq.len();
    let n_in = problem.b_in.len();

    let p = dense_to_upper_triangular_csc(&problem.h);
    let q: Vec<Float> = problem.f.iter().copied().collect();

    let mut a_rows = Matrix::<Float>::zeros((n_eq + n_in, n));
    a_rows.slice_mut(ndarray::s![0..n_eq, ..]).assign(&problem.a_eq);
    a_rows.slice_mut(ndarray::s![n_eq.., ..]).assign(&problem.a_in);
    let a = dense_to_csc(&a_rows);

    let mut b: Vec<Float> = Vec::with_capacity(n_eq + n_in);
    b.extend(problem.b_eq.iter().copied());
    b.extend(problem.b_in.iter().copied());

    let cones: Vec<SupportedConeT<Float>> = vec![ZeroConeT(n_eq), NonnegativeConeT(n_in)];
    let settings = DefaultSettings::default();

    let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings);
    solver.solve();

    match solver.solution.status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => QpSolution {
            x: Vector::from(solver.solution.x.clone()),
            status: SolveStatus::Solved,
        },
        _ => QpSolution {
            x: Vector::zeros(n),
            status: SolveStatus::Failed,
        },
    }
}

#[cfg(test)]
mod tests {
    use dmpc_linalg::Vector;
    use ndarray::array;

    use super::*;

    #[test]
    fn unconstrained_minimum_matches_closed_form() {
        // minimize ½(2x^2) - 4x == minimize x^2 - 4x, minimized at x=2.
        let problem = QpProblem {
            h: array![[2.0]],
            f: array![-4.0],
            a_eq: Matrix::<Float>::zeros((0, 1)),
            b_eq: Vector::<Float>::zeros(0),
            a_in: Matrix::<Float>::zeros((0, 1)),
            b_in: Vector::<Float>::zeros(0),
        };
        let solution = solve(&problem);
        assert_eq!(solution.status, SolveStatus::Solved);
        assert!((solution.x[0] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn equality_constraint_is_respected() {
        // minimize x^2 + y^2 subject to x + y == 2 -> x = y = 1.
        let problem = QpProblem {
            h: array![[2.0, 0.0], [0.0, 2.0]],
            f: array![0.0, 0.0],
            a_eq: array![[1.0, 1.0]],
            b_eq: array![2.0],
            a_in: Matrix::<Float>::zeros((0, 2)),
            b_in: Vector::<Float>::zeros(0),
        };
        let solution = solve(&problem);
        assert_eq!(solution.status, SolveStatus::Solved);
        assert!((solution.x[0] - 1.0).abs() < 1e-4);
        assert!((solution.x[1] - 1.0).abs() < 1e-4);
    }
}
