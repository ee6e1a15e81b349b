//! Shared control-point bookkeeping for [`super::mesh::MeshTransform`] and
//! [`super::grid::GridTransform`], grounded on `ControlPointBase` in
//! `nornir_imageregistration/transforms/controlpointbase.py`.
//!
//! Every non-affine transform in this crate holds `(fixed, warped)` point
//! pairs: `warped` is a coordinate in the moving (source) image, `fixed` is
//! where phase correlation/manual placement says that coordinate belongs in
//! the reference (target) image. `transform` maps warped -> fixed,
//! `inverse_transform` maps fixed -> warped.

use std::cell::Cell;

use crate::error::{RegistrationError, Result};
use crate::geometry::Rectangle;

/// A `(fixed, warped)` point-pair table with lazily-cached bounding boxes
/// that are invalidated whenever the point set is mutated.
#[derive(Debug, Clone)]
pub struct ControlPoints {
    fixed: Vec<(f64, f64)>,
    warped: Vec<(f64, f64)>,
    fixed_bbox: Cell<Option<Rectangle>>,
    warped_bbox: Cell<Option<Rectangle>>,
}

impl ControlPoints {
    pub fn new() -> Self {
        Self { fixed: Vec::new(), warped: Vec::new(), fixed_bbox: Cell::new(None), warped_bbox: Cell::new(None) }
    }

    /// Build from parallel point lists, rejecting duplicate warped-space
    /// points (the original raises on duplicate control points because the
    /// Delaunay triangulation and RBF solve both degenerate on them).
    pub fn from_pairs(fixed: Vec<(f64, f64)>, warped: Vec<(f64, f64)>) -> Result<Self> {
        if fixed.len() != warped.len() {
            return Err(RegistrationError::ShapeMismatch {
                expected: (fixed.len(), 0),
                got: (warped.len(), 0),
            });
        }
        let mut cp = Self::new();
        for (f, w) in fixed.into_iter().zip(warped) {
            cp.add_point(f, w)?;
        }
        Ok(cp)
    }

    pub fn len(&self) -> usize {
        self.warped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warped.is_empty()
    }

    pub fn fixed_points(&self) -> &[(f64, f64)] {
        &self.fixed
    }

    pub fn warped_points(&self) -> &[(f64, f64)] {
        &self.warped
    }

    /// Add a point pair, rejecting an exact duplicate of an existing warped
    /// point (distinct fixed targets for the same source point make every
    /// downstream solve ambiguous) or an exact duplicate of an existing fixed
    /// point (spec §4.C: a mutation that collapses two points onto the same
    /// target coordinate is rejected the same way).
    pub fn add_point(&mut self, fixed: (f64, f64), warped: (f64, f64)) -> Result<()> {
        if self.warped.iter().any(|&p| p == warped) {
            return Err(RegistrationError::DuplicatePoint { y: warped.0, x: warped.1 });
        }
        if self.fixed.iter().any(|&p| p == fixed) {
            return Err(RegistrationError::DuplicatePoint { y: fixed.0, x: fixed.1 });
        }
        self.fixed.push(fixed);
        self.warped.push(warped);
        self.invalidate();
        Ok(())
    }

    /// Remove the point pair nearest `warped_point` within `tolerance`
    /// pixels, returning the removed index if one was found.
    pub fn remove_nearest(&mut self, warped_point: (f64, f64), tolerance: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &p) in self.warped.iter().enumerate() {
            let d = dist(p, warped_point);
            if d <= tolerance && best.map(|(_, bd)| d < bd).unwrap_or(true) {
                best = Some((i, d));
            }
        }
        if let Some((i, _)) = best {
            self.fixed.remove(i);
            self.warped.remove(i);
            self.invalidate();
            Some(i)
        } else {
            None
        }
    }

    fn invalidate(&mut self) {
        self.fixed_bbox.set(None);
        self.warped_bbox.set(None);
    }

    /// Apply `f` to every fixed-space point (target-side mutation). Used by
    /// [`super::mesh::MeshTransform`]/[`super::grid::GridTransform`]'s
    /// `translate_target`/`scale_target`/`rotate_target`: an affine remap of
    /// the fixed coordinates preserves the warped-space Delaunay
    /// triangulation, so callers only need to re-solve the RBF fallback.
    pub fn map_fixed(&mut self, mut f: impl FnMut((f64, f64)) -> (f64, f64)) {
        for p in self.fixed.iter_mut() {
            *p = f(*p);
        }
        self.invalidate();
    }

    /// Apply `f` to every warped-space point (source-side mutation).
    pub fn map_warped(&mut self, mut f: impl FnMut((f64, f64)) -> (f64, f64)) {
        for p in self.warped.iter_mut() {
            *p = f(*p);
        }
        self.invalidate();
    }

    pub fn fixed_bounding_box(&self) -> Rectangle {
        if let Some(bbox) = self.fixed_bbox.get() {
            return bbox;
        }
        let bbox = bounding_box_of(&self.fixed);
        self.fixed_bbox.set(Some(bbox));
        bbox
    }

    pub fn warped_bounding_box(&self) -> Rectangle {
        if let Some(bbox) = self.warped_bbox.get() {
            return bbox;
        }
        let bbox = bounding_box_of(&self.warped);
        self.warped_bbox.set(Some(bbox));
        bbox
    }
}

impl Default for ControlPoints {
    fn default() -> Self {
        Self::new()
    }
}

fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn bounding_box_of(points: &[(f64, f64)]) -> Rectangle {
    if points.is_empty() {
        return Rectangle::new(0.0, 0.0, 0.0, 0.0);
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_warped_point() {
        let mut cp = ControlPoints::new();
        cp.add_point((0.0, 0.0), (1.0, 1.0)).unwrap();
        let err = cp.add_point((5.0, 5.0), (1.0, 1.0)).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicatePoint { .. }));
    }

    #[test]
    fn rejects_duplicate_fixed_point() {
        let mut cp = ControlPoints::new();
        cp.add_point((2.0, 2.0), (0.0, 0.0)).unwrap();
        let err = cp.add_point((2.0, 2.0), (9.0, 9.0)).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicatePoint { .. }));
    }

    #[test]
    fn bounding_box_covers_all_points() {
        let mut cp = ControlPoints::new();
        cp.add_point((0.0, 0.0), (0.0, 0.0)).unwrap();
        cp.add_point((10.0, 4.0), (10.0, 4.0)).unwrap();
        let bbox = cp.warped_bounding_box();
        assert_eq!(bbox.height, 10.0);
        assert_eq!(bbox.width, 4.0);
    }

    #[test]
    fn remove_nearest_drops_the_closest_pair() {
        let mut cp = ControlPoints::new();
        cp.add_point((0.0, 0.0), (0.0, 0.0)).unwrap();
        cp.add_point((10.0, 10.0), (10.0, 10.0)).unwrap();
        let removed = cp.remove_nearest((0.1, 0.1), 1.0);
        assert_eq!(removed, Some(0));
        assert_eq!(cp.len(), 1);
    }
}
