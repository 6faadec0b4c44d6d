//! Ellipse geometry and direct least-squares conic fitting.
//!
//! The measurement stage turns a silhouette contour into an ellipse via the
//! direct method of Fitzgibbon et al. (1999): a constrained generalized
//! eigenvalue problem whose constraint matrix enforces B² − 4AC < 0, so the
//! fit can only return an ellipse.

use nalgebra::{DMatrix, Matrix3, Vector3, Vector6};
use serde::{Deserialize, Serialize};

/// General conic A x² + B xy + C y² + D x + E y + F = 0, stored as
/// `[A, B, C, D, E, F]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConicCoeffs(pub [f64; 6]);

/// Geometric ellipse parameters in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    /// Center x.
    pub cx: f64,
    /// Center y.
    pub cy: f64,
    /// Semi-major axis length.
    pub a: f64,
    /// Semi-minor axis length.
    pub b: f64,
    /// Rotation of the major axis from +x, radians, in (−π/2, π/2].
    pub angle: f64,
}

impl ConicCoeffs {
    /// Whether the coefficients describe an ellipse (B² − 4AC < 0).
    pub fn is_ellipse(&self) -> bool {
        let [a, b, c, ..] = self.0;
        b * b - 4.0 * a * c < 0.0
    }

    /// Convert to geometric parameters; `None` for non-elliptical conics.
    pub fn to_ellipse(self) -> Option<Ellipse> {
        conic_to_ellipse(&self)
    }
}

impl Ellipse {
    /// Positive, finite axes and finite center/angle.
    pub fn is_valid(&self) -> bool {
        self.a > 0.0
            && self.b > 0.0
            && self.a.is_finite()
            && self.b.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.angle.is_finite()
    }

    /// Major-axis length (2a).
    pub fn major_axis(&self) -> f64 {
        2.0 * self.a
    }

    /// Point-membership test: whether `(x, y)` lies inside or on the ellipse.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (sin_t, cos_t) = self.angle.sin_cos();
        let dx = x - self.cx;
        let dy = y - self.cy;
        let u = cos_t * dx + sin_t * dy;
        let v = -sin_t * dx + cos_t * dy;
        (u / self.a).powi(2) + (v / self.b).powi(2) <= 1.0
    }

    /// Sample `n` points on the boundary.
    pub fn sample_points(&self, n: usize) -> Vec<[f64; 2]> {
        let (sin_t, cos_t) = self.angle.sin_cos();
        (0..n)
            .map(|i| {
                let t = 2.0 * std::f64::consts::PI * (i as f64) / (n as f64);
                let px = self.a * t.cos();
                let py = self.b * t.sin();
                [
                    self.cx + cos_t * px - sin_t * py,
                    self.cy + sin_t * px + cos_t * py,
                ]
            })
            .collect()
    }
}

/// Fit an ellipse to 2D points by direct constrained least squares.
///
/// Requires at least 6 points. Returns `None` when the points do not
/// determine a proper ellipse (collinear, clustered, degenerate).
pub fn fit_ellipse_direct(points: &[[f64; 2]]) -> Option<Ellipse> {
    let n = points.len();
    if n < 6 {
        return None;
    }

    // Normalize for conditioning: centroid at the origin, mean distance √2.
    let (mx, my, scale) = normalization(points);

    let mut d = DMatrix::<f64>::zeros(n, 6);
    for (i, &[px, py]) in points.iter().enumerate() {
        let x = (px - mx) * scale;
        let y = (py - my) * scale;
        d[(i, 0)] = x * x;
        d[(i, 1)] = x * y;
        d[(i, 2)] = y * y;
        d[(i, 3)] = x;
        d[(i, 4)] = y;
        d[(i, 5)] = 1.0;
    }

    let s = d.transpose() * &d;
    let s11 = s.fixed_view::<3, 3>(0, 0).into_owned();
    let s12 = s.fixed_view::<3, 3>(0, 3).into_owned();
    let s22 = s.fixed_view::<3, 3>(3, 3).into_owned();

    // Ellipse-constraint matrix: aᵀ C1 a = 4AC − B².
    let c1 = Matrix3::new(0.0, 0.0, 2.0, 0.0, -1.0, 0.0, 2.0, 0.0, 0.0);

    // Reduce to the 3×3 system (S11 − S12 S22⁻¹ S12ᵀ) a1 = λ C1 a1.
    let s22_inv = s22.try_inverse()?;
    let m = s11 - s12 * s22_inv * s12.transpose();
    let system = c1.try_inverse()? * m;

    let a1 = constrained_eigenvector(&system)?;
    let a2 = -s22_inv * s12.transpose() * a1;

    let coeffs = denormalize(
        &Vector6::new(a1[0], a1[1], a1[2], a2[0], a2[1], a2[2]),
        mx,
        my,
        scale,
    );
    let conic = ConicCoeffs(coeffs);
    if !conic.is_ellipse() {
        return None;
    }
    conic.to_ellipse().filter(Ellipse::is_valid)
}

/// Convert general conic coefficients to geometric ellipse parameters.
pub fn conic_to_ellipse(conic: &ConicCoeffs) -> Option<Ellipse> {
    let [a, b, c, d, e, f] = conic.0;

    let disc = b * b - 4.0 * a * c;
    if disc >= 0.0 {
        return None;
    }

    // Center from the gradient-zero system 2A·cx + B·cy + D = 0,
    // B·cx + 2C·cy + E = 0.
    let denom = -disc;
    let cx = (b * e - 2.0 * c * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;

    let angle = if (a - c).abs() < 1e-15 {
        match b.partial_cmp(&0.0) {
            Some(std::cmp::Ordering::Greater) => std::f64::consts::FRAC_PI_4,
            Some(std::cmp::Ordering::Less) => -std::f64::consts::FRAC_PI_4,
            _ => 0.0,
        }
    } else {
        0.5 * b.atan2(a - c)
    };

    // Semi-axes from the eigenvalues of the quadratic part.
    let sum = a + c;
    let diff = ((a - c).powi(2) + b * b).sqrt();
    let lambda1 = 0.5 * (sum + diff);
    let lambda2 = 0.5 * (sum - diff);

    let f_center = a * cx * cx + b * cx * cy + c * cy * cy + d * cx + e * cy + f;
    if f_center.abs() < 1e-15 {
        return None;
    }
    let a_sq = -f_center / lambda1;
    let b_sq = -f_center / lambda2;
    if a_sq <= 0.0 || b_sq <= 0.0 {
        return None;
    }

    let (semi_a, semi_b, angle) = if a_sq >= b_sq {
        (a_sq.sqrt(), b_sq.sqrt(), angle)
    } else {
        (b_sq.sqrt(), a_sq.sqrt(), angle + std::f64::consts::FRAC_PI_2)
    };

    Some(Ellipse {
        cx,
        cy,
        a: semi_a,
        b: semi_b,
        angle: wrap_half_pi(angle),
    })
}

/// Convert geometric ellipse parameters to conic coefficients.
pub fn ellipse_to_conic(e: &Ellipse) -> ConicCoeffs {
    let (sin_t, cos_t) = e.angle.sin_cos();
    let a2 = e.a * e.a;
    let b2 = e.b * e.b;

    let ca = cos_t * cos_t / a2 + sin_t * sin_t / b2;
    let cb = 2.0 * cos_t * sin_t * (1.0 / a2 - 1.0 / b2);
    let cc = sin_t * sin_t / a2 + cos_t * cos_t / b2;
    let cd = -2.0 * ca * e.cx - cb * e.cy;
    let ce = -cb * e.cx - 2.0 * cc * e.cy;
    let cf = ca * e.cx * e.cx + cb * e.cx * e.cy + cc * e.cy * e.cy - 1.0;

    ConicCoeffs([ca, cb, cc, cd, ce, cf])
}

// ── Internals ──────────────────────────────────────────────────────────────

fn normalization(points: &[[f64; 2]]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let mx: f64 = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let my: f64 = points.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist: f64 = points
        .iter()
        .map(|p| ((p[0] - mx).powi(2) + (p[1] - my).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let scale = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    (mx, my, scale)
}

/// Undo the normalization substitution x' = s(x − mx), y' = s(y − my).
fn denormalize(c: &Vector6<f64>, mx: f64, my: f64, s: f64) -> [f64; 6] {
    let [a_, b_, c_, d_, e_, f_] = [c[0], c[1], c[2], c[3], c[4], c[5]];
    let s2 = s * s;

    let a = a_ * s2;
    let b = b_ * s2;
    let c = c_ * s2;
    let d = -2.0 * a_ * s2 * mx - b_ * s2 * my + d_ * s;
    let e = -b_ * s2 * mx - 2.0 * c_ * s2 * my + e_ * s;
    let f =
        a_ * s2 * mx * mx + b_ * s2 * mx * my + c_ * s2 * my * my - d_ * s * mx - e_ * s * my + f_;

    [a, b, c, d, e, f]
}

/// Eigenvector of the reduced system satisfying the ellipse constraint
/// 4 v₀ v₂ − v₁² > 0.
///
/// The system matrix is not symmetric, so eigenvalues come from the
/// characteristic cubic and eigenvectors from adjugate null vectors.
fn constrained_eigenvector(system: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let a = system;
    let tr = a[(0, 0)] + a[(1, 1)] + a[(2, 2)];
    let minor_sum = a[(0, 0)] * a[(1, 1)] - a[(0, 1)] * a[(1, 0)] + a[(0, 0)] * a[(2, 2)]
        - a[(0, 2)] * a[(2, 0)]
        + a[(1, 1)] * a[(2, 2)]
        - a[(1, 2)] * a[(2, 1)];
    let det = a.determinant();

    let mut best: Option<(f64, Vector3<f64>)> = None;
    for ev in cubic_roots(-tr, minor_sum, -det) {
        let shifted = system - Matrix3::identity() * ev;
        let Some(v) = null_vector(&shifted) else {
            continue;
        };
        if 4.0 * v[0] * v[2] - v[1] * v[1] > 0.0 {
            let better = best.map_or(true, |(b, _)| ev.abs() < b);
            if better {
                best = Some((ev.abs(), v));
            }
        }
    }
    best.map(|(_, v)| v)
}

/// Null vector of a near-singular 3×3 matrix: the largest-norm row of the
/// adjugate.
fn null_vector(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let rows = [
        Vector3::new(
            m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)],
            -(m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)]),
            m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)],
        ),
        Vector3::new(
            -(m[(0, 1)] * m[(2, 2)] - m[(0, 2)] * m[(2, 1)]),
            m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)],
            -(m[(0, 0)] * m[(2, 1)] - m[(0, 1)] * m[(2, 0)]),
        ),
        Vector3::new(
            m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)],
            -(m[(0, 0)] * m[(1, 2)] - m[(0, 2)] * m[(1, 0)]),
            m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
        ),
    ];

    let best = rows
        .iter()
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;
    let norm_sq = best.norm_squared();
    if norm_sq < 1e-30 {
        return None;
    }
    Some(best / norm_sq.sqrt())
}

/// Real roots of x³ + px² + qx + r = 0.
fn cubic_roots(p: f64, q: f64, r: f64) -> Vec<f64> {
    // Depressed form t³ + at + b with x = t − p/3.
    let a = q - p * p / 3.0;
    let b = 2.0 * p * p * p / 27.0 - p * q / 3.0 + r;
    let shift = -p / 3.0;

    let disc = -4.0 * a * a * a - 27.0 * b * b;
    if disc >= 0.0 {
        let rad = (-a / 3.0).max(0.0).sqrt();
        let cos_arg = if rad.abs() < 1e-15 {
            0.0
        } else {
            (-b / (2.0 * rad * rad * rad)).clamp(-1.0, 1.0)
        };
        let theta = cos_arg.acos();
        let two_r = 2.0 * rad;
        vec![
            two_r * (theta / 3.0).cos() + shift,
            two_r * ((theta + 2.0 * std::f64::consts::PI) / 3.0).cos() + shift,
            two_r * ((theta + 4.0 * std::f64::consts::PI) / 3.0).cos() + shift,
        ]
    } else {
        let sqrt_disc = (b * b / 4.0 + a * a * a / 27.0).sqrt();
        let u = (-b / 2.0 + sqrt_disc).cbrt();
        let v = (-b / 2.0 - sqrt_disc).cbrt();
        vec![u + v + shift]
    }
}

fn wrap_half_pi(mut angle: f64) -> f64 {
    let pi = std::f64::consts::PI;
    while angle > pi / 2.0 {
        angle -= pi;
    }
    while angle <= -pi / 2.0 {
        angle += pi;
    }
    angle
}
