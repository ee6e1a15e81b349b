//! Thin-plate-spline radial basis function interpolation with a global
//! linear correction term, grounded on the `InterpolateControlPoints`/
//! `RBFInterpolator` fallback paths in
//! `nornir_imageregistration/transforms/triangulation.py`.
//!
//! Solves once for a global mapping `domain -> range` using all control
//! points; the solution is cached behind a [`OnceCell`] and dropped whenever
//! [`RbfInterpolator::refit`] is called with new points, since the
//! `O(n^3)` solve dominates the constant term already at a few hundred
//! points.

use nalgebra::{DMatrix, DVector};
use once_cell::sync::OnceCell;

use crate::error::{RegistrationError, Result};
use crate::transform::Point;

#[derive(Clone)]
struct RbfSolution {
    weights_y: Vec<f64>,
    linear_y: (f64, f64, f64),
    weights_x: Vec<f64>,
    linear_x: (f64, f64, f64),
}

/// Maps `domain` control points onto `range` control points (both in the
/// same order) via a thin-plate spline plus an affine correction.
#[derive(Clone)]
pub struct RbfInterpolator {
    domain: Vec<Point>,
    range: Vec<Point>,
    solution: OnceCell<RbfSolution>,
}

fn thin_plate(r: f64) -> f64 {
    if r < 1e-12 {
        0.0
    } else {
        r * r * r.ln()
    }
}

fn distance(a: Point, b: Point) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

impl RbfInterpolator {
    pub fn new(domain: Vec<Point>, range: Vec<Point>) -> Self {
        Self { domain, range, solution: OnceCell::new() }
    }

    /// Replace the control points and discard any cached solve.
    pub fn refit(&mut self, domain: Vec<Point>, range: Vec<Point>) {
        self.domain = domain;
        self.range = range;
        self.solution = OnceCell::new();
    }

    pub fn len(&self) -> usize {
        self.domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }

    fn solution(&self) -> Result<&RbfSolution> {
        self.solution.get_or_try_init(|| self.solve())
    }

    fn solve(&self) -> Result<RbfSolution> {
        let n = self.domain.len();
        if n < 3 {
            return Err(RegistrationError::InsufficientEvidence { surviving: n, required: 3 });
        }

        let dim = n + 3;
        let mut a = DMatrix::<f64>::zeros(dim, dim);
        for i in 0..n {
            for j in 0..n {
                a[(i, j)] = thin_plate(distance(self.domain[i], self.domain[j]));
            }
            a[(i, n)] = 1.0;
            a[(i, n + 1)] = self.domain[i].0;
            a[(i, n + 2)] = self.domain[i].1;
            a[(n, i)] = 1.0;
            a[(n + 1, i)] = self.domain[i].0;
            a[(n + 2, i)] = self.domain[i].1;
        }

        let lu = a.lu();

        let mut b_y = DVector::<f64>::zeros(dim);
        let mut b_x = DVector::<f64>::zeros(dim);
        for i in 0..n {
            b_y[i] = self.range[i].0;
            b_x[i] = self.range[i].1;
        }

        let sol_y = lu
            .solve(&b_y)
            .ok_or_else(|| RegistrationError::DegenerateStats("RBF control points are degenerate (collinear or coincident)".into()))?;
        let sol_x = lu
            .solve(&b_x)
            .ok_or_else(|| RegistrationError::DegenerateStats("RBF control points are degenerate (collinear or coincident)".into()))?;

        Ok(RbfSolution {
            weights_y: sol_y.rows(0, n).iter().copied().collect(),
            linear_y: (sol_y[n], sol_y[n + 1], sol_y[n + 2]),
            weights_x: sol_x.rows(0, n).iter().copied().collect(),
            linear_x: (sol_x[n], sol_x[n + 1], sol_x[n + 2]),
        })
    }

    pub fn evaluate(&self, points: &[Point]) -> Result<Vec<Point>> {
        let solution = self.solution()?;
        Ok(points
            .iter()
            .map(|&p| {
                let mut y = solution.linear_y.0 + solution.linear_y.1 * p.0 + solution.linear_y.2 * p.1;
                let mut x = solution.linear_x.0 + solution.linear_x.1 * p.0 + solution.linear_x.2 * p.1;
                for (i, &cp) in self.domain.iter().enumerate() {
                    let phi = thin_plate(distance(p, cp));
                    y += solution.weights_y[i] * phi;
                    x += solution.weights_x[i] * phi;
                }
                (y, x)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reproduces_an_affine_mapping_exactly() {
        // A pure translation is within the linear term's span, so an exact
        // thin-plate fit should reproduce it with zero residual weights.
        let domain = vec![(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (10.0, 10.0), (5.0, 5.0)];
        let range: Vec<Point> = domain.iter().map(|&(y, x)| (y + 3.0, x - 2.0)).collect();
        let rbf = RbfInterpolator::new(domain, range);
        let out = rbf.evaluate(&[(2.0, 2.0)]).unwrap();
        assert!((out[0].0 - 5.0).abs() < 1e-6);
        assert!((out[0].1 - 0.0).abs() < 1e-6);
    }

    #[test]
    fn too_few_points_is_insufficient_evidence() {
        let rbf = RbfInterpolator::new(vec![(0.0, 0.0), (1.0, 1.0)], vec![(0.0, 0.0), (1.0, 1.0)]);
        assert!(rbf.evaluate(&[(0.0, 0.0)]).is_err());
    }

    #[test]
    fn refit_invalidates_cache() {
        let mut rbf = RbfInterpolator::new(
            vec![(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (10.0, 10.0), (5.0, 5.0)],
            vec![(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (10.0, 10.0), (5.0, 5.0)],
        );
        let first = rbf.evaluate(&[(2.0, 2.0)]).unwrap();
        assert!((first[0].0 - 2.0).abs() < 1e-6);

        let domain = vec![(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (10.0, 10.0), (5.0, 5.0)];
        let range: Vec<Point> = domain.iter().map(|&(y, x)| (y + 1.0, x)).collect();
        rbf.refit(domain, range);
        let second = rbf.evaluate(&[(2.0, 2.0)]).unwrap();
        assert!((second[0].0 - 3.0).abs() < 1e-6);
    }
}
