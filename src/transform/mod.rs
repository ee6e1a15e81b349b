//! Coordinate transforms (spec §4.C): rigid, similarity, piecewise-linear
//! mesh, and bilinear grid, each mapping warped (source image) coordinates
//! to fixed (reference image) coordinates and back.

pub mod control_points;
pub mod grid;
pub mod mesh;
pub mod rbf;
pub mod rigid;
pub mod similarity;

use crate::error::Result;
use crate::geometry::Rectangle;

pub use grid::GridTransform;
pub use mesh::MeshTransform;
pub use rigid::RigidTransform;
pub use similarity::SimilarityTransform;

/// Points are `(y, x)` pairs, matching [`Rectangle`]'s axis order throughout
/// the crate.
pub type Point = (f64, f64);

/// Common contract every transform implements: a forward map from warped
/// (source) to fixed (reference) space, its inverse, the bounding boxes on
/// both sides, and the mutation operations of spec §4.C's contract table
/// (each of which invalidates any cached derivative structure — RBF
/// solution, bounding box — per spec §3's change-notification rule).
pub trait Transform {
    /// Map points from warped (source) space into fixed (reference) space.
    fn transform(&self, points: &[Point]) -> Vec<Point>;

    /// Map points from fixed (reference) space back into warped (source)
    /// space. Non-affine transforms may fail with `OutOfDomain` for points
    /// outside their defined region when extrapolation isn't possible.
    fn inverse_transform(&self, points: &[Point]) -> Result<Vec<Point>>;

    /// The region of warped (source) space this transform is defined over.
    fn bounding_box(&self) -> Rectangle;

    /// Alias for [`Transform::bounding_box`], named to match spec §4.C's
    /// `source_bbox()`/`target_bbox()` pair.
    fn source_bbox(&self) -> Rectangle {
        self.bounding_box()
    }

    /// The region of fixed (target) space this transform is defined over.
    /// The default maps `source_bbox()`'s four corners forward and takes
    /// their bounding box; [`mesh::MeshTransform`] and [`grid::GridTransform`]
    /// override this with their exact fixed-space control point extent.
    fn target_bbox(&self) -> Rectangle {
        let b = self.source_bbox();
        let corners = [(b.min_y, b.min_x), (b.min_y, b.max_x()), (b.max_y(), b.min_x), (b.max_y(), b.max_x())];
        Rectangle::bounding_of(&self.transform(&corners))
    }

    /// Shift target (fixed-space) points by `delta`.
    fn translate_target(&mut self, delta: Point);

    /// Shift source (warped-space) points by `delta`.
    fn translate_source(&mut self, delta: Point);

    /// Multiply both source- and target-space coordinates by `factor`.
    fn scale(&mut self, factor: f64);

    /// Multiply only source-space (warped) coordinates by `factor`.
    fn scale_source(&mut self, factor: f64);

    /// Multiply only target-space (fixed) coordinates by `factor`.
    fn scale_target(&mut self, factor: f64);

    /// Rotate target (fixed-space) points by `angle` radians about `center`
    /// (defaults to the origin when `None`).
    fn rotate_target(&mut self, angle: f64, center: Option<Point>);
}

/// Enumeration of the transform kinds this crate supports, used wherever a
/// transform needs to be stored, serialized, or passed across an API
/// boundary without generics (spec §4.H STOS parsing needs this).
#[derive(Clone)]
pub enum AnyTransform {
    Rigid(RigidTransform),
    Similarity(SimilarityTransform),
    Mesh(MeshTransform),
    Grid(GridTransform),
}

impl Transform for AnyTransform {
    fn transform(&self, points: &[Point]) -> Vec<Point> {
        match self {
            AnyTransform::Rigid(t) => t.transform(points),
            AnyTransform::Similarity(t) => t.transform(points),
            AnyTransform::Mesh(t) => t.transform(points),
            AnyTransform::Grid(t) => t.transform(points),
        }
    }

    fn inverse_transform(&self, points: &[Point]) -> Result<Vec<Point>> {
        match self {
            AnyTransform::Rigid(t) => t.inverse_transform(points),
            AnyTransform::Similarity(t) => t.inverse_transform(points),
            AnyTransform::Mesh(t) => t.inverse_transform(points),
            AnyTransform::Grid(t) => t.inverse_transform(points),
        }
    }

    fn bounding_box(&self) -> Rectangle {
        match self {
            AnyTransform::Rigid(t) => t.bounding_box(),
            AnyTransform::Similarity(t) => t.bounding_box(),
            AnyTransform::Mesh(t) => t.bounding_box(),
            AnyTransform::Grid(t) => t.bounding_box(),
        }
    }

    fn target_bbox(&self) -> Rectangle {
        match self {
            AnyTransform::Rigid(t) => t.target_bbox(),
            AnyTransform::Similarity(t) => t.target_bbox(),
            AnyTransform::Mesh(t) => t.target_bbox(),
            AnyTransform::Grid(t) => t.target_bbox(),
        }
    }

    fn translate_target(&mut self, delta: Point) {
        match self {
            AnyTransform::Rigid(t) => t.translate_target(delta),
            AnyTransform::Similarity(t) => t.translate_target(delta),
            AnyTransform::Mesh(t) => t.translate_target(delta),
            AnyTransform::Grid(t) => t.translate_target(delta),
        }
    }

    fn translate_source(&mut self, delta: Point) {
        match self {
            AnyTransform::Rigid(t) => t.translate_source(delta),
            AnyTransform::Similarity(t) => t.translate_source(delta),
            AnyTransform::Mesh(t) => t.translate_source(delta),
            AnyTransform::Grid(t) => t.translate_source(delta),
        }
    }

    fn scale(&mut self, factor: f64) {
        match self {
            AnyTransform::Rigid(t) => t.scale(factor),
            AnyTransform::Similarity(t) => t.scale(factor),
            AnyTransform::Mesh(t) => t.scale(factor),
            AnyTransform::Grid(t) => t.scale(factor),
        }
    }

    fn scale_source(&mut self, factor: f64) {
        match self {
            AnyTransform::Rigid(t) => t.scale_source(factor),
            AnyTransform::Similarity(t) => t.scale_source(factor),
            AnyTransform::Mesh(t) => t.scale_source(factor),
            AnyTransform::Grid(t) => t.scale_source(factor),
        }
    }

    fn scale_target(&mut self, factor: f64) {
        match self {
            AnyTransform::Rigid(t) => t.scale_target(factor),
            AnyTransform::Similarity(t) => t.scale_target(factor),
            AnyTransform::Mesh(t) => t.scale_target(factor),
            AnyTransform::Grid(t) => t.scale_target(factor),
        }
    }

    fn rotate_target(&mut self, angle: f64, center: Option<Point>) {
        match self {
            AnyTransform::Rigid(t) => t.rotate_target(angle, center),
            AnyTransform::Similarity(t) => t.rotate_target(angle, center),
            AnyTransform::Mesh(t) => t.rotate_target(angle, center),
            AnyTransform::Grid(t) => t.rotate_target(angle, center),
        }
    }
}

/// Chains `first` then `second`: `transform` applies `first` then `second`;
/// `inverse_transform` undoes `second` then `first`. Used to fold a
/// translation/rotation correction onto an existing mesh or grid transform
/// without refitting it.
#[derive(Clone)]
pub struct ComposedTransform<A, B> {
    pub first: A,
    pub second: B,
}

impl<A: Transform, B: Transform> Transform for ComposedTransform<A, B> {
    fn transform(&self, points: &[Point]) -> Vec<Point> {
        let mid = self.first.transform(points);
        self.second.transform(&mid)
    }

    fn inverse_transform(&self, points: &[Point]) -> Result<Vec<Point>> {
        let mid = self.second.inverse_transform(points)?;
        self.first.inverse_transform(&mid)
    }

    fn bounding_box(&self) -> Rectangle {
        self.first.bounding_box()
    }

    fn target_bbox(&self) -> Rectangle {
        self.second.target_bbox()
    }

    // Mutations are routed to whichever leg of the composition owns that
    // side of the mapping: `first` owns source space, `second` owns target
    // space.
    fn translate_target(&mut self, delta: Point) {
        self.second.translate_target(delta);
    }

    fn translate_source(&mut self, delta: Point) {
        self.first.translate_source(delta);
    }

    fn scale(&mut self, factor: f64) {
        self.first.scale(factor);
        self.second.scale(factor);
    }

    fn scale_source(&mut self, factor: f64) {
        self.first.scale_source(factor);
    }

    fn scale_target(&mut self, factor: f64) {
        self.second.scale_target(factor);
    }

    fn rotate_target(&mut self, angle: f64, center: Option<Point>) {
        self.second.rotate_target(angle, center);
    }
}
