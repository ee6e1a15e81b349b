//! Piecewise-linear mesh transform, grounded on `TriangulatedTransform` in
//! `nornir_imageregistration/transforms/triangulation.py`.
//!
//! Control points are Delaunay-triangulated once in warped (source) space;
//! the resulting triangle connectivity is reused verbatim to interpret
//! fixed (reference) space, so the same triangle both locates a forward
//! query point and, run in reverse, locates a fixed-space query point for
//! `inverse_transform`. Queries outside the triangulated region fall back
//! to a thin-plate RBF fit over every control point.

use spade::{DelaunayTriangulation, HasPosition, Point2, Triangulation};

use crate::error::{RegistrationError, Result};
use crate::geometry::Rectangle;
use crate::transform::control_points::ControlPoints;
use crate::transform::rbf::RbfInterpolator;
use crate::transform::{Point, Transform};

#[derive(Clone, Copy)]
struct IndexedVertex {
    pos: Point2<f64>,
    index: usize,
}

impl HasPosition for IndexedVertex {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.pos
    }
}

#[derive(Clone)]
pub struct MeshTransform {
    control_points: ControlPoints,
    triangles: Vec<[usize; 3]>,
    forward_rbf: RbfInterpolator,
    inverse_rbf: RbfInterpolator,
    bounding_box: Rectangle,
}

const BARYCENTRIC_EPSILON: f64 = 1e-6;

impl MeshTransform {
    pub fn new(control_points: ControlPoints) -> Result<Self> {
        if control_points.len() < 3 {
            return Err(RegistrationError::InsufficientEvidence { surviving: control_points.len(), required: 3 });
        }

        let mut triangulation: DelaunayTriangulation<IndexedVertex> = DelaunayTriangulation::new();
        for (index, &(y, x)) in control_points.warped_points().iter().enumerate() {
            triangulation
                .insert(IndexedVertex { pos: Point2::new(x, y), index })
                .map_err(|_| RegistrationError::DuplicatePoint { y, x })?;
        }

        let triangles: Vec<[usize; 3]> = triangulation
            .inner_faces()
            .map(|face| {
                let verts = face.vertices();
                [verts[0].data().index, verts[1].data().index, verts[2].data().index]
            })
            .collect();

        let warped = control_points.warped_points().to_vec();
        let fixed = control_points.fixed_points().to_vec();
        let forward_rbf = RbfInterpolator::new(warped.clone(), fixed.clone());
        let inverse_rbf = RbfInterpolator::new(fixed, warped);
        let bounding_box = control_points.warped_bounding_box();

        Ok(Self { control_points, triangles, forward_rbf, inverse_rbf, bounding_box })
    }

    pub fn control_points(&self) -> &ControlPoints {
        &self.control_points
    }

    fn locate(&self, query: Point, vertex_positions: impl Fn(usize) -> Point) -> Option<(usize, (f64, f64, f64))> {
        for (tri_idx, tri) in self.triangles.iter().enumerate() {
            let p0 = vertex_positions(tri[0]);
            let p1 = vertex_positions(tri[1]);
            let p2 = vertex_positions(tri[2]);
            if let Some(weights) = barycentric(p0, p1, p2, query) {
                return Some((tri_idx, weights));
            }
        }
        None
    }

    /// Re-solve both RBF fallbacks from the current control points. Called
    /// after every mutation: translation/uniform scale/rotation of either
    /// point set is a similarity map and so never changes which triangle a
    /// warped-space point falls in, but the interpolators still need to see
    /// the moved coordinates.
    fn rebuild_rbf(&mut self) {
        let warped = self.control_points.warped_points().to_vec();
        let fixed = self.control_points.fixed_points().to_vec();
        self.forward_rbf.refit(warped.clone(), fixed.clone());
        self.inverse_rbf.refit(fixed, warped);
    }
}

/// Barycentric weights of `q` inside triangle `(p0, p1, p2)`, or `None` if
/// `q` lies strictly outside it. Shared with [`super::grid::GridTransform`],
/// which triangulates its regular lattice the same way.
pub(super) fn barycentric(p0: Point, p1: Point, p2: Point, q: Point) -> Option<(f64, f64, f64)> {
    let (y0, x0) = p0;
    let (y1, x1) = p1;
    let (y2, x2) = p2;
    let (qy, qx) = q;

    let denom = (y1 - y2) * (x0 - x2) + (x2 - x1) * (y0 - y2);
    if denom.abs() < 1e-12 {
        return None;
    }

    let w0 = ((y1 - y2) * (qx - x2) + (x2 - x1) * (qy - y2)) / denom;
    let w1 = ((y2 - y0) * (qx - x2) + (x0 - x2) * (qy - y2)) / denom;
    let w2 = 1.0 - w0 - w1;

    if w0 >= -BARYCENTRIC_EPSILON && w1 >= -BARYCENTRIC_EPSILON && w2 >= -BARYCENTRIC_EPSILON {
        Some((w0, w1, w2))
    } else {
        None
    }
}

pub(super) fn blend(p0: Point, p1: Point, p2: Point, weights: (f64, f64, f64)) -> Point {
    let (w0, w1, w2) = weights;
    (p0.0 * w0 + p1.0 * w1 + p2.0 * w2, p0.1 * w0 + p1.1 * w1 + p2.1 * w2)
}

impl Transform for MeshTransform {
    fn transform(&self, points: &[Point]) -> Vec<Point> {
        let warped = self.control_points.warped_points();
        let fixed = self.control_points.fixed_points();

        let mut fallback = Vec::new();
        let mut out = Vec::with_capacity(points.len());

        for (i, &p) in points.iter().enumerate() {
            match self.locate(p, |idx| warped[idx]) {
                Some((tri_idx, weights)) => {
                    let tri = self.triangles[tri_idx];
                    out.push(blend(fixed[tri[0]], fixed[tri[1]], fixed[tri[2]], weights));
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
        let warped = self.control_points.warped_points();
        let fixed = self.control_points.fixed_points();

        let mut fallback = Vec::new();
        let mut out = Vec::with_capacity(points.len());

        for (i, &p) in points.iter().enumerate() {
            match self.locate(p, |idx| fixed[idx]) {
                Some((tri_idx, weights)) => {
                    let tri = self.triangles[tri_idx];
                    out.push(blend(warped[tri[0]], warped[tri[1]], warped[tri[2]], weights));
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
        self.control_points.map_fixed(|(y, x)| (y + delta.0, x + delta.1));
        self.rebuild_rbf();
    }

    fn translate_source(&mut self, delta: Point) {
        self.control_points.map_warped(|(y, x)| (y + delta.0, x + delta.1));
        self.bounding_box = self.control_points.warped_bounding_box();
        self.rebuild_rbf();
    }

    fn scale(&mut self, factor: f64) {
        self.control_points.map_fixed(|(y, x)| (y * factor, x * factor));
        self.control_points.map_warped(|(y, x)| (y * factor, x * factor));
        self.bounding_box = self.control_points.warped_bounding_box();
        self.rebuild_rbf();
    }

    fn scale_source(&mut self, factor: f64) {
        self.control_points.map_warped(|(y, x)| (y * factor, x * factor));
        self.bounding_box = self.control_points.warped_bounding_box();
        self.rebuild_rbf();
    }

    fn scale_target(&mut self, factor: f64) {
        self.control_points.map_fixed(|(y, x)| (y * factor, x * factor));
        self.rebuild_rbf();
    }

    fn rotate_target(&mut self, angle: f64, center: Option<Point>) {
        let (cy, cx) = center.unwrap_or((0.0, 0.0));
        let (sin_a, cos_a) = angle.sin_cos();
        self.control_points.map_fixed(|(y, x)| {
            let (dy, dx) = (y - cy, x - cx);
            (dy * cos_a - dx * sin_a + cy, dy * sin_a + dx * cos_a + cx)
        });
        self.rebuild_rbf();
    }
}
