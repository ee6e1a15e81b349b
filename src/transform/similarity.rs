//! Scale + rotation + translation transform, grounded on
//! `CenteredSimilarity2DTransform` in
//! `nornir_imageregistration/transforms/rigid.py`.

use crate::error::{RegistrationError, Result};
use crate::geometry::Rectangle;
use crate::transform::{Point, Transform};

/// `fixed = rotate(scale(warped - center), angle) + center + translation`.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityTransform {
    angle: f64,
    scale: f64,
    translation: (f64, f64),
    rotation_center: (f64, f64),
    bounding_box: Rectangle,
}

impl SimilarityTransform {
    pub fn new(
        angle: f64,
        scale: f64,
        translation: (f64, f64),
        rotation_center: (f64, f64),
        bounding_box: Rectangle,
    ) -> Self {
        Self { angle, scale, translation, rotation_center, bounding_box }
    }

    /// The intrinsic warped-to-fixed scale factor this transform was built
    /// with. Named distinctly from [`Transform::scale`], which uniformly
    /// dilates both spaces and leaves this ratio untouched.
    pub fn intrinsic_scale(&self) -> f64 {
        self.scale
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn translation(&self) -> (f64, f64) {
        self.translation
    }

    pub fn rotation_center(&self) -> (f64, f64) {
        self.rotation_center
    }
}

impl Transform for SimilarityTransform {
    fn transform(&self, points: &[Point]) -> Vec<Point> {
        let (sin_a, cos_a) = self.angle.sin_cos();
        let (cy, cx) = self.rotation_center;
        points
            .iter()
            .map(|&(y, x)| {
                let (dy, dx) = ((y - cy) * self.scale, (x - cx) * self.scale);
                let ry = dy * cos_a - dx * sin_a;
                let rx = dy * sin_a + dx * cos_a;
                (ry + cy + self.translation.0, rx + cx + self.translation.1)
            })
            .collect()
    }

    fn inverse_transform(&self, points: &[Point]) -> Result<Vec<Point>> {
        if self.scale.abs() < 1e-12 {
            return Err(RegistrationError::OutOfDomain);
        }
        let (sin_a, cos_a) = (-self.angle).sin_cos();
        let (cy, cx) = self.rotation_center;
        Ok(points
            .iter()
            .map(|&(y, x)| {
                let (dy, dx) = (y - cy - self.translation.0, x - cx - self.translation.1);
                let ry = (dy * cos_a - dx * sin_a) / self.scale;
                let rx = (dy * sin_a + dx * cos_a) / self.scale;
                (ry + cy, rx + cx)
            })
            .collect())
    }

    fn bounding_box(&self) -> Rectangle {
        self.bounding_box
    }

    fn translate_target(&mut self, delta: Point) {
        self.translation.0 += delta.0;
        self.translation.1 += delta.1;
    }

    fn translate_source(&mut self, delta: Point) {
        self.rotation_center.0 += delta.0;
        self.rotation_center.1 += delta.1;
        self.bounding_box.min_y += delta.0;
        self.bounding_box.min_x += delta.1;
    }

    fn scale(&mut self, factor: f64) {
        self.rotation_center.0 *= factor;
        self.rotation_center.1 *= factor;
        self.translation.0 *= factor;
        self.translation.1 *= factor;
        self.bounding_box = self.bounding_box.scale(factor);
    }

    fn scale_source(&mut self, factor: f64) {
        self.rotation_center.0 *= factor;
        self.rotation_center.1 *= factor;
        self.bounding_box = self.bounding_box.scale(factor);
        self.scale /= factor;
    }

    fn scale_target(&mut self, factor: f64) {
        self.translation.0 *= factor;
        self.translation.1 *= factor;
        self.scale *= factor;
    }

    fn rotate_target(&mut self, angle: f64, center: Option<Point>) {
        let (cy2, cx2) = center.unwrap_or((0.0, 0.0));
        let (cy, cx) = self.rotation_center;
        let (sin2, cos2) = angle.sin_cos();
        let base_y = self.scale * cy + self.translation.0 - cy2;
        let base_x = self.scale * cx + self.translation.1 - cx2;
        let rotated_y = base_y * cos2 - base_x * sin2;
        let rotated_x = base_y * sin2 + base_x * cos2;
        self.translation.0 = rotated_y + cy2 - self.scale * cy;
        self.translation.1 = rotated_x + cx2 - self.scale * cx;
        self.angle += angle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_round_trips() {
        let bbox = Rectangle::new(0.0, 0.0, 100.0, 100.0);
        let t = SimilarityTransform::new(0.0, 2.0, (0.0, 0.0), (50.0, 50.0), bbox);
        let fixed = t.transform(&[(60.0, 50.0)]);
        assert!((fixed[0].0 - 70.0).abs() < 1e-9);
        let warped = t.inverse_transform(&fixed).unwrap();
        assert!((warped[0].0 - 60.0).abs() < 1e-9);
        assert!((warped[0].1 - 50.0).abs() < 1e-9);
    }

    #[test]
    fn zero_scale_is_out_of_domain_on_inverse() {
        let bbox = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let t = SimilarityTransform::new(0.0, 0.0, (0.0, 0.0), (5.0, 5.0), bbox);
        assert!(matches!(t.inverse_transform(&[(5.0, 5.0)]), Err(RegistrationError::OutOfDomain)));
    }
}
