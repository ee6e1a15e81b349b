//! End-to-end registration scenarios (spec §8), exercising the public
//! pipeline the way a caller would: load/construct rasters, run `align`
//! and `refine`, round-trip the result through `stos`.

use ndarray::Array2;

use nornir_imageregistration::align::{self, AlignmentOptions};
use nornir_imageregistration::geometry::Rectangle;
use nornir_imageregistration::raster::{DType, Raster};
use nornir_imageregistration::refine::{self, RefinementOptions};
use nornir_imageregistration::stos::{self, StosPair};
use nornir_imageregistration::transform::rigid::RigidTransform;
use nornir_imageregistration::transform::{AnyTransform, Transform};
use nornir_imageregistration::workers::Workers;

/// A speckle-like pattern with no translational symmetry over the tested
/// shift range, so phase correlation has a single sharp peak to find.
fn speckle(h: usize, w: usize) -> Raster {
    Raster::new(
        Array2::from_shape_fn((h, w), |(y, x)| {
            let v = ((y * 928_371 + x * 541_1) % 997) as f32 / 997.0;
            if v > 0.6 {
                1.0
            } else {
                0.0
            }
        }),
        DType::F32,
    )
}

/// Nearest-neighbor rotation about the raster's center, mirroring how
/// `align::evaluate_angle` rotates a candidate source before phase
/// correlating it.
fn rotated(raster: &Raster, degrees: f64) -> Raster {
    let (h, w) = raster.shape();
    let (cy, cx) = (h as f64 / 2.0, w as f64 / 2.0);
    let (sin_a, cos_a) = degrees.to_radians().sin_cos();
    let mut out = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let dy = y as f64 - cy;
            let dx = x as f64 - cx;
            let sy = dy * cos_a - dx * sin_a + cy;
            let sx = dy * sin_a + dx * cos_a + cx;
            if sy >= 0.0 && sx >= 0.0 {
                let (syu, sxu) = (sy.round() as usize, sx.round() as usize);
                if syu < h && sxu < w {
                    out[[y, x]] = raster.get(syu, sxu);
                }
            }
        }
    }
    Raster::new(out, raster.dtype())
}

fn shifted(raster: &Raster, dy: isize, dx: isize) -> Raster {
    let (h, w) = raster.shape();
    let mut out = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        let sy = y as isize - dy;
        if sy < 0 || sy >= h as isize {
            continue;
        }
        for x in 0..w {
            let sx = x as isize - dx;
            if sx < 0 || sx >= w as isize {
                continue;
            }
            out[[y, x]] = raster.get(sy as usize, sx as usize);
        }
    }
    Raster::new(out, raster.dtype())
}

#[test]
fn self_alignment_recovers_zero_angle_and_offset() {
    let image = speckle(96, 96);
    let workers = Workers::new(4);
    let options = AlignmentOptions { angles_to_search: 19, try_flip: false, ..Default::default() };

    let transform = align::slice_to_slice(&image, &image, options, &workers).unwrap();

    assert!(transform.angle().abs() < 0.05);
    let (dy, dx) = transform.translation();
    assert!(dy.abs() < 2.0, "dy = {dy}");
    assert!(dx.abs() < 2.0, "dx = {dx}");
}

#[test]
fn known_translation_is_recovered() {
    let target = speckle(96, 96);
    let source = shifted(&target, 9, -11);
    let workers = Workers::new(4);
    let options = AlignmentOptions { angles_to_search: 5, try_flip: false, ..Default::default() };

    let transform = align::slice_to_slice(&target, &source, options, &workers).unwrap();

    let (dy, dx) = transform.translation();
    assert!((dy - 9.0).abs() < 2.0, "dy = {dy}");
    assert!((dx - (-11.0)).abs() < 2.0, "dx = {dx}");
}

/// Regression for a fine-sweep bug where the refinement pass searched
/// `[-1, 1]` degrees around zero instead of around the coarse best angle,
/// discarding a correct non-trivial coarse result. A rotation like this one
/// (well outside `[-1, 1]`) only recovers the right angle and offset if the
/// fine sweep actually brackets the coarse answer.
#[test]
fn known_rotation_is_recovered() {
    let target = speckle(96, 96);
    let source = rotated(&target, 35.0);
    let workers = Workers::new(4);
    let options = AlignmentOptions { angles_to_search: 5, try_flip: false, ..Default::default() };

    let transform = align::slice_to_slice(&target, &source, options, &workers).unwrap();

    let recovered_degrees = transform.angle().to_degrees();
    assert!(
        (recovered_degrees - 35.0).abs() < 1.5 || (recovered_degrees + 35.0).abs() < 1.5,
        "angle = {recovered_degrees}"
    );
    let (dy, dx) = transform.translation();
    assert!(dy.abs() < 3.0, "dy = {dy}");
    assert!(dx.abs() < 3.0, "dx = {dx}");
}

#[test]
fn stos_round_trip_preserves_the_forward_map() {
    let bbox = Rectangle::new(0.0, 0.0, 100.0, 100.0);
    let original = RigidTransform::new(12f64.to_radians(), (4.0, -6.5), bbox.center(), bbox);

    let pair = StosPair {
        source_image_path: "source.png".into(),
        target_image_path: "target.png".into(),
        target_mask_path: None,
        source_mask_path: None,
        downsample: 1,
        target_size: (100, 100),
        source_size: (100, 100),
        transform: AnyTransform::Rigid(original),
    };

    let text = stos::write_stos(&pair);
    let parsed = stos::parse_stos(&text).unwrap();

    let probes: Vec<(f64, f64)> = (0..20)
        .map(|i| (i as f64 * 4.3, 100.0 - i as f64 * 3.1))
        .collect();

    let before = original.transform(&probes);
    let after = parsed.transform.transform(&probes);
    for ((by, bx), (ay, ax)) in before.iter().zip(after.iter()) {
        assert!((by - ay).abs() < 1e-6);
        assert!((bx - ax).abs() < 1e-6);
    }
}

#[test]
fn grid_refinement_of_an_identity_transform_converges() {
    let image = speckle(160, 160);
    let bbox = Rectangle::new(0.0, 0.0, 160.0, 160.0);
    let identity = RigidTransform::identity(bbox);
    let workers = Workers::new(4);
    let options = RefinementOptions { max_iterations: 10, cell_size: (32, 32), ..Default::default() };

    let (mesh, records) = refine::refine_grid(&image, &image, &identity, options, &workers).unwrap();

    let finalized = records.iter().filter(|r| r.finalized).count();
    assert!(
        finalized as f64 >= 0.5 * records.len() as f64,
        "expected most cells to finalize on an identity pair, got {finalized}/{}",
        records.len()
    );

    let probe = [(80.0, 80.0)];
    let mapped = mesh.transform(&probe)[0];
    assert!((mapped.0 - 80.0).abs() < 1.0);
    assert!((mapped.1 - 80.0).abs() < 1.0);
}

#[test]
fn flipped_source_is_recovered_when_flip_search_is_enabled() {
    let target = speckle(80, 80);
    let (h, w) = target.shape();
    let mut flipped = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            flipped[[y, w - 1 - x]] = target.get(y, x);
        }
    }
    let source = Raster::new(flipped, target.dtype());

    let workers = Workers::new(4);
    let options = AlignmentOptions { angles_to_search: 7, try_flip: true, ..Default::default() };
    let transform = align::slice_to_slice(&target, &source, options, &workers).unwrap();

    assert!(transform.flip_x_enabled());
}
