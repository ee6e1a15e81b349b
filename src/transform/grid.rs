//! Regular-lattice bilinear transform, grounded on `GridTransform` in
//! `nornir_imageregistration/transforms/grid.py`.
//!
//! Unlike [`super::mesh::MeshTransform`], the control points form a known
//! `rows x cols` lattice, so each cell's two triangles are known up front
//! without a Delaunay solve; queries outside the lattice fall back to a
//! thin-plate RBF fit over every anchor, same as the mesh transform.

use crate::error::{RegistrationError, Result};
use crate::geometry::Rectangle;
use crate::transform::mesh::{barycentric, blend};
use crate::transform::rbf::RbfInterpolator;
use crate::transform::{Point, Transform};

#[derive(Clone)]
pub struct GridTransform {
    rows: usize,
    cols: usize,
    warped: Vec<Point>,
    fixed: Vec<Point>,
    forward_rbf: RbfInterpolator,
    inverse_rbf: RbfInterpolator,
    bounding_box: Rectangle,
}

impl GridTransform {
    /// `warped`/`fixed` are row-major, `rows * cols` long: anchor
    /// `(r, c)` lives at index `r * cols + c`.
    pub fn new(rows: usize, cols: usize, warped: Vec<Point>, fixed: Vec<Point>) -> Result<Self> {
        if rows < 2 || cols < 2 {
            return Err(RegistrationError::InsufficientEvidence { surviving: rows * cols, required: 4 });
        }
        if warped.len() != rows * cols || fixed.len() != rows * cols {
            return Err(RegistrationError::ShapeMismatch {
                expected: (rows * cols, 0),
                got: (warped.len().min(fixed.len()), 0),
            });
        }

        let bounding_box = bounding_box_of(&warped);
        let forward_rbf = RbfInterpolator::new(warped.clone(), fixed.clone());
        let inverse_rbf = RbfInterpolator::new(fixed.clone(), warped.clone());

        Ok(Self { rows, cols, warped, fixed, forward_rbf, inverse_rbf, bounding_box })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn warped_points(&self) -> &[Point] {
        &self.warped
    }

    pub fn fixed_points(&self) -> &[Point] {
        &self.fixed
    }

    fn index(&self, r: usize, c: usize) -> usize {
        r * self.cols + c
    }

    /// Both triangles of cell `(r, c)`, named by their opposing corner.
    fn cell_triangles(&self, r: usize, c: usize) -> [[usize; 3]; 2] {
        let tl = self.index(r, c);
        let tr = self.index(r, c + 1);
        let bl = self.index(r + 1, c);
        let br = self.index(r + 1, c + 1);
        [[tl, tr, bl], [tr, br, bl]]
    }

    fn locate(&self, query: Point, positions: &[Point]) -> Option<([usize; 3], (f64, f64, f64))> {
        for r in 0..self.rows - 1 {
            for c in 0..self.cols - 1 {
                for tri in self.cell_triangles(r, c) {
                    let p0 = positions[tri[0]];
                    let p1 = positions[tri[1]];
                    let p2 = positions[tri[2]];
                    if let Some(weights) = barycentric(p0, p1, p2, query) {
                        return Some((tri, weights));
                    }
                }
            }
        }
        None
    }

    fn rebuild_rbf(&mut self) {
        self.forward_rbf.refit(self.warped.clone(), self.fixed.clone());
        self.inverse_rbf.refit(self.fixed.clone(), self.warped.clone());
    }
}

fn bounding_box_of(points: &[Point]) -> Rectangle {
    let (mut min_y, mut min_x) = (f64::INFINITY, f64::INFINITY);
    let (mut max_y, mut max_x) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(y, x) in points {
        min_y = min_y.min(y);
        min_x = min_x.min(x);
        max_y = max_y.max(y);
        max_x = max_x.max(x);
    }
    Rectangle::new(min_y, min_x, max_y - min_y, max_x - min_x)
}

impl Transform for GridTransform {
    fn transform(&self, points: &[Point]) -> Vec<Point> {
        let mut fallback = Vec::new();
        let mut out = Vec::with_capacity(points.len());

        for (i, &p) in points.iter().enumerate() {
            match self.locate(p, &self.warped) {
                Some((tri, weights)) => {
                    out.push(blend(self.fixed[tri[0]], self.fixed[tri[1]], self.fixed[tri[2]], weights));
                }
                None => {
                    out.push((0.0, 0.0));
                    fallback.push((i, p));
                }
            }
        }

        if !fallback.is_empty() {
            let pts: Vec<Point> = fallback.iter().map(|&(_, p)| p).collect();
            if let Ok(interpolated) = self.forward_rbf.evaluate(&pts) {
                for ((i, _), v) in fallback.into_iter().zip(interpolated) {
                    out[i] = v;
                }
            }
        }

        out
    }

    fn inverse_transform(&self, points: &[Point]) -> Result<Vec<Point>> {
        let mut fallback = Vec::new();
        let mut out = Vec::with_capacity(points.len());

        for (i, &p) in points.iter().enumerate() {
            match self.locate(p, &self.fixed) {
                Some((tri, weights)) => {
                    out.push(blend(self.warped[tri[0]], self.warped[tri[1]], self.warped[tri[2]], weights));
                }
                None => {
                    out.push((0.0, 0.0));
                    fallback.push((i, p));
                }
            }
        }

        if !fallback.is_empty() {
            let pts: Vec<Point> = fallback.iter().map(|&(_, p)| p).collect();
            let interpolated = self.inverse_rbf.evaluate(&pts)?;
            for ((i, _), v) in fallback.into_iter().zip(interpolated) {
                out[i] = v;
            }
        }

        Ok(out)
    }

    fn bounding_box(&self) -> Rectangle {
        self.bounding_box
    }

    fn translate_target(&mut self, delta: Point) {
        for p in self.fixed.iter_mut() {
            p.0 += delta.0;
            p.1 += delta.1;
        }
        self.rebuild_rbf();
    }

    fn translate_source(&mut self, delta: Point) {
        for p in self.warped.iter_mut() {
            p.0 += delta.0;
            p.1 += delta.1;
        }
        self.bounding_box = bounding_box_of(&self.warped);
        self.rebuild_rbf();
    }

    fn scale(&mut self, factor: f64) {
        for p in self.fixed.iter_mut().chain(self.warped.iter_mut()) {
            p.0 *= factor;
            p.1 *= factor;
        }
        self.bounding_box = bounding_box_of(&self.warped);
        self.rebuild_rbf();
    }

    fn scale_source(&mut self, factor: f64) {
        for p in self.warped.iter_mut() {
            p.0 *= factor;
            p.1 *= factor;
        }
        self.bounding_box = bounding_box_of(&self.warped);
        self.rebuild_rbf();
    }

    fn scale_target(&mut self, factor: f64) {
        for p in self.fixed.iter_mut() {
            p.0 *= factor;
            p.1 *= factor;
        }
        self.rebuild_rbf();
    }

    fn rotate_target(&mut self, angle: f64, center: Option<Point>) {
        let (cy, cx) = center.unwrap_or((0.0, 0.0));
        let (sin_a, cos_a) = angle.sin_cos();
        for p in self.fixed.iter_mut() {
            let (dy, dx) = (p.0 - cy, p.1 - cx);
            p.0 = dy * cos_a - dx * sin_a + cy;
            p.1 = dy * sin_a + dx * cos_a + cx;
        }
        self.rebuild_rbf();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_grid(rows: usize, cols: usize, spacing: f64) -> GridTransform {
        let mut warped = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                warped.push((r as f64 * spacing, c as f64 * spacing));
            }
        }
        let fixed = warped.clone();
        GridTransform::new(rows, cols, warped, fixed).unwrap()
    }

    #[test]
    fn identity_grid_round_trips_interior_point() {
        let grid = identity_grid(3, 3, 10.0);
        let fixed = grid.transform(&[(5.0, 5.0)]);
        assert!((fixed[0].0 - 5.0).abs() < 1e-6);
        assert!((fixed[0].1 - 5.0).abs() < 1e-6);
        let warped = grid.inverse_transform(&fixed).unwrap();
        assert!((warped[0].0 - 5.0).abs() < 1e-6);
        assert!((warped[0].1 - 5.0).abs() < 1e-6);
    }

    #[test]
    fn too_small_lattice_is_rejected() {
        assert!(GridTransform::new(1, 1, vec![(0.0, 0.0)], vec![(0.0, 0.0)]).is_err());
    }

    #[test]
    fn shifted_grid_translates_interior_points() {
        let warped = vec![(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (10.0, 10.0)];
        let fixed: Vec<Point> = warped.iter().map(|&(y, x)| (y + 2.0, x + 1.0)).collect();
        let grid = GridTransform::new(2, 2, warped, fixed).unwrap();
        let out = grid.transform(&[(5.0, 5.0)]);
        assert!((out[0].0 - 7.0).abs() < 1e-6);
        assert!((out[0].1 - 6.0).abs() < 1e-6);
    }
}
