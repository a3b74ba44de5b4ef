//! Ellipsoidal distance metric and small vector/matrix aliases shared by the
//! planner crates.

/// The precision of the floating point type used throughout the planner.
pub type Float = f64;

/// A point or vector in three-dimensional space.
pub type Point3 = [Float; 3];

/// An agent's predicted positions over the `K`-step prediction horizon,
/// produced by the last replan tick.
pub type Horizon = Vec<Point3>;

pub type Vector<T> = ndarray::Array1<T>;
pub type Matrix<T> = ndarray::Array2<T>;
pub type VectorView<'a, T> = ndarray::ArrayView1<'a, T>;
pub type MatrixView<'a, T> = ndarray::ArrayView2<'a, T>;

/// The anisotropic, order-`q` ellipsoidal footprint shared by every agent and
/// static obstacle.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Ellipse {
    /// Norm order `q`, even and ≥ 2.
    pub order: i32,
    /// Minimum separation `r_min`.
    pub r_min: Float,
    /// Anisotropy scale `c = (1, 1, c_z)`, `c_z >= 1`.
    pub c_z: Float,
}

impl Ellipse {
    #[must_use]
    pub fn new(order: i32, r_min: Float, c_z: Float) -> Self {
        Self { order, r_min, c_z }
    }

    fn scale(&self) -> Point3 {
        [1.0, 1.0, self.c_z]
    }

    /// `e = E^{-1} (p_i - p_j)`.
    fn e_inv_delta(&self, p_i: Point3, p_j: Point3) -> Point3 {
        let c = self.scale();
        [
            (p_i[0] - p_j[0]) / c[0],
            (p_i[1] - p_j[1]) / c[1],
            (p_i[2] - p_j[2]) / c[2],
        ]
    }

    /// The ellipsoidal q-norm `‖E^{-1}(p_i - p_j)‖_q`.
    #[must_use]
    pub fn distance(&self, p_i: Point3, p_j: Point3) -> Float {
        let e = self.e_inv_delta(p_i, p_j);
        let q = self.order as Float;
        e.iter().map(|x| x.abs().powf(q)).sum::<Float>().powf(1.0 / q)
    }

    /// The linearization terms used by both avoiders: the current
    /// ellipsoidal distance `d` and the component-wise gradient
    /// direction `g = (E^{-2}(p_i - p_j))^{q-1}`.
    #[must_use]
    pub fn linearize(&self, p_i: Point3, p_j: Point3) -> CollisionLinearization {
        let c = self.scale();
        let delta = [p_i[0] - p_j[0], p_i[1] - p_j[1], p_i[2] - p_j[2]];
        let e_inv_sq = [
            delta[0] / (c[0] * c[0]),
            delta[1] / (c[1] * c[1]),
            delta[2] / (c[2] * c[2]),
        ];
        let exponent = (self.order - 1) as Float;
        let g = [
            e_inv_sq[0].signum() * e_inv_sq[0].abs().powf(exponent),
            e_inv_sq[1].signum() * e_inv_sq[1].abs().powf(exponent),
            e_inv_sq[2].signum() * e_inv_sq[2].abs().powf(exponent),
        ];
        CollisionLinearization {
            distance: self.distance(p_i, p_j),
            gradient: g,
        }
    }
}

/// First-order Taylor expansion terms of the ellipsoidal separation
/// constraint about a previous iterate, shared by both avoiders.
#[derive(Debug, Clone, Copy)]
pub struct CollisionLinearization {
    /// `d_ij` at the linearization point.
    pub distance: Float,
    /// `g = (E^{-2} delta)^{q-1}`, component-wise.
    pub gradient: Point3,
}

#[must_use]
pub fn dot3(a: Point3, b: Point3) -> Float {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}
