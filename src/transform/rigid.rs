//! Rigid (rotation + translation) transform, grounded on `Rigid2DTransform`
//! in `nornir_imageregistration/transforms/rigid.py`.

use crate::error::Result;
use crate::geometry::Rectangle;
use crate::transform::{Point, Transform};

/// Rotation about `rotation_center` (in warped/source space) by `angle`
/// radians, counter-clockwise, followed by a translation into fixed space.
///
/// `gain` is the ratio of fixed-space units to warped-space units, kept at
/// `1.0` by a plain rigid alignment and only diverging once
/// [`Transform::scale_source`]/[`Transform::scale_target`] are applied
/// asymmetrically — at that point the map is rigid in form but similarity in
/// effect, which is the same trade the `Transform` mutation contract forces
/// on every non-affine implementor.
#[derive(Debug, Clone, Copy)]
pub struct RigidTransform {
    angle: f64,
    translation: (f64, f64),
    rotation_center: (f64, f64),
    bounding_box: Rectangle,
    flip_x: bool,
    gain: f64,
}

impl RigidTransform {
    pub fn new(angle: f64, translation: (f64, f64), rotation_center: (f64, f64), bounding_box: Rectangle) -> Self {
        Self { angle, translation, rotation_center, bounding_box, flip_x: false, gain: 1.0 }
    }

    pub fn identity(bounding_box: Rectangle) -> Self {
        Self::new(0.0, (0.0, 0.0), bounding_box.center(), bounding_box)
    }

    /// Mirror warped-space x before rotating; used for the flip case in
    /// `align::slice_to_slice` (spec §4.D edge case).
    pub fn with_flip_x(mut self, flip_x: bool) -> Self {
        self.flip_x = flip_x;
        self
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

    pub fn flip_x_enabled(&self) -> bool {
        self.flip_x
    }

    fn rotate_delta_forward(&self, dy: f64, dx: f64) -> (f64, f64) {
        let dx = if self.flip_x { -dx } else { dx };
        let (sin_a, cos_a) = self.angle.sin_cos();
        (dy * cos_a - dx * sin_a, dy * sin_a + dx * cos_a)
    }

    fn rotate_delta_inverse(&self, dy: f64, dx: f64) -> (f64, f64) {
        let (sin_a, cos_a) = (-self.angle).sin_cos();
        let ry = dy * cos_a - dx * sin_a;
        let rx = dy * sin_a + dx * cos_a;
        (ry, if self.flip_x { -rx } else { rx })
    }
}

impl Transform for RigidTransform {
    fn transform(&self, points: &[Point]) -> Vec<Point> {
        let (cy, cx) = self.rotation_center;
        points
            .iter()
            .map(|&(y, x)| {
                let (ry, rx) = self.rotate_delta_forward(y - cy, x - cx);
                (ry * self.gain + cy * self.gain + self.translation.0, rx * self.gain + cx * self.gain + self.translation.1)
            })
            .collect()
    }

    fn inverse_transform(&self, points: &[Point]) -> Result<Vec<Point>> {
        let (cy, cx) = self.rotation_center;
        Ok(points
            .iter()
            .map(|&(y, x)| {
                let dy = (y - self.translation.0) / self.gain - cy;
                let dx = (x - self.translation.1) / self.gain - cx;
                let (ry, rx) = self.rotate_delta_inverse(dy, dx);
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
        self.gain /= factor;
    }

    fn scale_target(&mut self, factor: f64) {
        self.translation.0 *= factor;
        self.translation.1 *= factor;
        self.gain *= factor;
    }

    fn rotate_target(&mut self, angle: f64, center: Option<Point>) {
        let (cy2, cx2) = center.unwrap_or((0.0, 0.0));
        let (cy, cx) = self.rotation_center;
        let (sin2, cos2) = angle.sin_cos();
        let base_y = self.gain * cy + self.translation.0 - cy2;
        let base_x = self.gain * cx + self.translation.1 - cx2;
        let rotated_y = base_y * cos2 - base_x * sin2;
        let rotated_x = base_y * sin2 + base_x * cos2;
        self.translation.0 = rotated_y + cy2 - self.gain * cy;
        self.translation.1 = rotated_x + cx2 - self.gain * cx;
        self.angle += angle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_a_no_op() {
        let bbox = Rectangle::new(0.0, 0.0, 100.0, 100.0);
        let t = RigidTransform::identity(bbox);
        let pts = vec![(10.0, 20.0), (50.0, 50.0)];
        assert_eq!(t.transform(&pts), pts);
    }

    #[test]
    fn translation_round_trips() {
        let bbox = Rectangle::new(0.0, 0.0, 100.0, 100.0);
        let t = RigidTransform::new(0.0, (5.0, -3.0), (50.0, 50.0), bbox);
        let fixed = t.transform(&[(10.0, 10.0)]);
        assert_eq!(fixed, vec![(15.0, 7.0)]);
        let warped = t.inverse_transform(&fixed).unwrap();
        assert!((warped[0].0 - 10.0).abs() < 1e-9);
        assert!((warped[0].1 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn rotation_round_trip() {
        let bbox = Rectangle::new(0.0, 0.0, 100.0, 100.0);
        let t = RigidTransform::new(std::f64::consts::FRAC_PI_4, (0.0, 0.0), (50.0, 50.0), bbox);
        let pts = vec![(10.0, 90.0), (90.0, 10.0)];
        let fixed = t.transform(&pts);
        let warped = t.inverse_transform(&fixed).unwrap();
        for (a, b) in pts.iter().zip(warped.iter()) {
            assert!((a.0 - b.0).abs() < 1e-9);
            assert!((a.1 - b.1).abs() < 1e-9);
        }
    }
}
