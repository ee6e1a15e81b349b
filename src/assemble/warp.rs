//! Warp kernel and tile renderer (spec §4.F), grounded on
//! `WarpedImageToFixedSpace`/`TransformTile` in
//! `nornir_imageregistration/assemble.py` and `assemble_tiles.py`.

use ndarray::Array2;

use crate::error::Result;
use crate::geometry::Rectangle;
use crate::raster::{DType, Raster};
use crate::transform::{AnyTransform, Transform};

/// Bilinearly sample `raster` at fractional coordinate `(y, x)`, clamping
/// to the nearest edge pixel rather than extrapolating.
fn bilinear_sample(raster: &Raster, y: f64, x: f64) -> f32 {
    let (h, w) = raster.shape();
    let y = y.clamp(0.0, (h - 1) as f64);
    let x = x.clamp(0.0, (w - 1) as f64);

    let y0 = y.floor() as usize;
    let x0 = x.floor() as usize;
    let y1 = (y0 + 1).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let fy = (y - y0 as f64) as f32;
    let fx = (x - x0 as f64) as f32;

    let top = raster.get(y0, x0) * (1.0 - fx) + raster.get(y0, x1) * fx;
    let bottom = raster.get(y1, x0) * (1.0 - fx) + raster.get(y1, x1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Warp a region of `warped_raster` into target (fixed) space.
///
/// `origin`/`area` describe the target-space region to fill, in integer
/// pixels. Target coordinates that `transform.inverse_transform` maps
/// outside `warped_raster`'s bounds are filled with `fill` instead of
/// extrapolated. When `distance_image` is supplied (the warped image's own
/// center-distance buffer), a matching distance-to-center raster is
/// produced by sampling it at the same source coordinates.
pub fn warped_to_fixed(
    transform: &dyn Transform,
    warped_raster: &Raster,
    origin: (i64, i64),
    area: (usize, usize),
    fill: f32,
    distance_image: Option<&Raster>,
) -> Result<(Raster, Option<Raster>)> {
    let (area_h, area_w) = area;
    let mut targets = Vec::with_capacity(area_h * area_w);
    for dy in 0..area_h {
        for dx in 0..area_w {
            targets.push((origin.0 as f64 + dy as f64, origin.1 as f64 + dx as f64));
        }
    }

    let src_coords = transform.inverse_transform(&targets)?;

    let (src_h, src_w) = warped_raster.shape();
    let mut out = Array2::<f32>::from_elem((area_h, area_w), fill);
    let mut dist_out = distance_image.map(|_| Array2::<f32>::from_elem((area_h, area_w), f32::INFINITY));

    for (i, &(sy, sx)) in src_coords.iter().enumerate() {
        let dy = i / area_w;
        let dx = i % area_w;
        if sy < 0.0 || sx < 0.0 || sy > (src_h - 1) as f64 || sx > (src_w - 1) as f64 {
            continue;
        }
        out[[dy, dx]] = bilinear_sample(warped_raster, sy, sx);
        if let (Some(dist_img), Some(dist_arr)) = (distance_image, dist_out.as_mut()) {
            dist_arr[[dy, dx]] = bilinear_sample(dist_img, sy, sx);
        }
    }

    Ok((Raster::new(out, warped_raster.dtype()), dist_out.map(|a| Raster::new(a, DType::F32))))
}

/// One source tile in a mosaic: its pixel data and the transform mapping
/// its warped (source) space into the mosaic's fixed space.
///
/// `transform` is the closed [`AnyTransform`] enum rather than a trait
/// object so a tile can be freely cloned and handed to worker threads
/// (spec §4.G): every transform kind the crate supports derives `Clone`.
#[derive(Clone)]
pub struct Tile {
    pub raster: Raster,
    pub transform: AnyTransform,
    /// Scale between this tile's native pixel grid and the space its
    /// transform's control points were fit in (`1.0` unless the tile was
    /// downsampled before alignment).
    pub source_space_scale: f64,
}

/// Output of rendering one tile into target space: the warped pixels, the
/// matching center-distance buffer (for Z-buffer compositing), and the
/// target-space region they cover.
pub struct TransformedImageData {
    pub image: Raster,
    pub center_distance_image: Raster,
    pub target_bbox: Rectangle,
}

/// Render `tile` into the region of target space described by
/// `target_region` (defaults to the tile's full target bounding box),
/// rescaling the transform first if `target_space_scale` differs from the
/// tile's native `source_space_scale`.
pub fn transform_tile(
    tile: &Tile,
    target_space_scale: Option<f64>,
    target_region: Option<Rectangle>,
) -> Result<TransformedImageData> {
    let target_space_scale = target_space_scale.unwrap_or(1.0);

    let mut transform = tile.transform.clone();
    if (target_space_scale - tile.source_space_scale).abs() > 1e-12 {
        if target_space_scale < tile.source_space_scale {
            transform.scale_target(target_space_scale / tile.source_space_scale);
        } else {
            transform.scale_source(tile.source_space_scale / target_space_scale);
        }
    }

    let region = target_region.unwrap_or_else(|| transform.target_bbox()).safe_round();
    let (origin_y, origin_x, height, width) = region.to_usize_bounds();

    let distance_image = super::distance::create_distance_image(tile.raster.height(), tile.raster.width());
    let (image, center_distance_image) = warped_to_fixed(
        &transform,
        &tile.raster,
        (origin_y as i64, origin_x as i64),
        (height, width),
        0.0,
        Some(&distance_image),
    )?;

    Ok(TransformedImageData {
        image,
        center_distance_image: center_distance_image.expect("distance_image was Some"),
        target_bbox: region,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rectangle;
    use crate::raster::DType;
    use crate::transform::rigid::RigidTransform;

    fn ramp(h: usize, w: usize) -> Raster {
        Raster::new(Array2::from_shape_fn((h, w), |(y, x)| (y * w + x) as f32), DType::F32)
    }

    #[test]
    fn identity_warp_reproduces_source_region() {
        let raster = ramp(16, 16);
        let bbox = Rectangle::new(0.0, 0.0, 16.0, 16.0);
        let identity = RigidTransform::identity(bbox);
        let (out, _) = warped_to_fixed(&identity, &raster, (0, 0), (16, 16), -1.0, None).unwrap();
        for y in 0..16 {
            for x in 0..16 {
                assert!((out.get(y, x) - raster.get(y, x)).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn out_of_bounds_region_is_filled() {
        let raster = ramp(4, 4);
        let bbox = Rectangle::new(0.0, 0.0, 4.0, 4.0);
        let identity = RigidTransform::identity(bbox);
        let (out, _) = warped_to_fixed(&identity, &raster, (10, 10), (4, 4), -5.0, None).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(out.get(y, x), -5.0);
            }
        }
    }
}
