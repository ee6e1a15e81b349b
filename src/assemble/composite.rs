//! Z-buffer tile compositing (spec §4.F), grounded on
//! `CompositeImageWithZBuffer`/`TilesToImage` in
//! `nornir_imageregistration/assemble_tiles.py`.

use crate::error::{RegistrationError, Result};
use crate::geometry::Rectangle;
use crate::raster::{DType, Raster};
use crate::transform::Transform;
use crate::workers::Workers;

use super::warp::{transform_tile, Tile};

/// A fully assembled mosaic: the composited image and the boolean coverage
/// mask (`true` wherever at least one tile contributed a pixel).
pub struct CompositeResult {
    pub image: Raster,
    pub mask: Vec<bool>,
}

/// Composite `tiles` into a single raster covering `target_region` (or the
/// union of every tile's target bounding box, if `None`), each pixel taken
/// from whichever tile's center-distance buffer is smallest there.
///
/// Rendering each tile is farmed out to `workers`; the harvested results
/// are then folded into the output/Z-buffer sequentially since compositing
/// one pixel depends on every earlier tile's contribution to it. Tiles
/// that fail to render (singular transform, out-of-bounds inverse
/// coordinates) are logged and skipped rather than aborting the whole
/// assembly; the resulting mask simply leaves that region uncovered.
pub fn tileset_to_image(
    tiles: &[Tile],
    workers: &Workers,
    target_region: Option<Rectangle>,
    target_space_scale: Option<f64>,
) -> Result<CompositeResult> {
    let region = match target_region {
        Some(r) => r,
        None => {
            let mut union = None;
            for tile in tiles {
                let bbox = tile.transform.target_bbox();
                union = Some(match union {
                    Some(u) => Rectangle::union(&u, &bbox),
                    None => bbox,
                });
            }
            union.unwrap_or(Rectangle::new(0.0, 0.0, 0.0, 0.0))
        }
    }
    .safe_round();

    let (origin_y, origin_x, height, width) = region.to_usize_bounds();
    if height == 0 || width == 0 {
        return Ok(CompositeResult { image: Raster::zeros(0, 0, DType::F32), mask: Vec::new() });
    }

    let mut out_image = Raster::zeros(height, width, DType::F32);
    let mut z_buffer = vec![f32::INFINITY; height * width];

    let owned: Vec<Tile> = tiles.to_vec();
    let rendered = workers.map(owned, move |tile| transform_tile(&tile, target_space_scale, Some(region)));

    for (idx, outcome) in rendered.into_iter().enumerate() {
        let rendered = match outcome {
            Ok(rendered) => rendered,
            Err(err) => {
                log::warn!("skipping tile {idx}: failed to render into target space: {err}");
                continue;
            }
        };

        let bbox = rendered.target_bbox;
        if bbox.min_y < 0.0 || bbox.min_x < 0.0 {
            return Err(RegistrationError::CompositeOutOfBounds);
        }

        let tile_origin_y = bbox.min_y as i64 - origin_y as i64;
        let tile_origin_x = bbox.min_x as i64 - origin_x as i64;
        let (tile_h, tile_w) = rendered.image.shape();

        for ty in 0..tile_h {
            let out_y = tile_origin_y + ty as i64;
            if out_y < 0 || out_y as usize >= height {
                continue;
            }
            for tx in 0..tile_w {
                let out_x = tile_origin_x + tx as i64;
                if out_x < 0 || out_x as usize >= width {
                    continue;
                }

                let flat = out_y as usize * width + out_x as usize;
                let candidate_distance = rendered.center_distance_image.get(ty, tx);
                if candidate_distance < z_buffer[flat] {
                    z_buffer[flat] = candidate_distance;
                    out_image.data_mut()[[out_y as usize, out_x as usize]] = rendered.image.get(ty, tx);
                }
            }
        }
    }

    let mask = z_buffer.iter().map(|&d| d.is_finite()).collect();
    Ok(CompositeResult { image: out_image, mask })
}
