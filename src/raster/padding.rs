//! Padding, cropping, and tiling (spec §4.A), grounded on
//! `PadImageForPhaseCorrelation`, `CropImage`, and `ImageToTilesGenerator`
//! in `nornir_imageregistration/core.py`.

use ndarray::Array2;

use crate::error::Result;
use crate::raster::noise::random_noise_mask;
use crate::raster::{stats_of, DType, Raster};

/// `cval` for [`crop`]: either a literal fill value, or `Random` to sample
/// gaussian noise matching the source image's statistics.
#[derive(Debug, Clone, Copy)]
pub enum FillValue {
    Literal(f32),
    Random,
}

/// `f(o) = 1 if o >= 0.5 else 1 + 2(1 - (o + 0.5))` — the dimension growth
/// factor `pad_for_phase_correlation` applies before `pow2` rounding.
fn overlap_growth_factor(min_overlap: f64) -> f64 {
    if min_overlap >= 0.5 {
        1.0
    } else {
        1.0 + 2.0 * (1.0 - (min_overlap + 0.5))
    }
}

fn dimension_with_overlap(dim: usize, min_overlap: f64) -> usize {
    (dim as f64 * overlap_growth_factor(min_overlap)).ceil() as usize
}

fn nearest_power_of_two_at_least(val: usize) -> usize {
    let mut p = 1usize;
    while p < val {
        p <<= 1;
    }
    p
}

/// Centre `raster` in a new, larger raster, filling the border with gaussian
/// noise matching the original's median/stddev (clipped to its min/max) so
/// padded zeros can't create spurious phase-correlation peaks.
pub fn pad_for_phase_correlation(
    raster: &Raster,
    min_overlap: f64,
    new_h: Option<usize>,
    new_w: Option<usize>,
    pow2: bool,
) -> Result<Raster> {
    let (h, w) = raster.shape();

    let new_h = new_h.unwrap_or_else(|| {
        let d = dimension_with_overlap(h, min_overlap);
        if pow2 { nearest_power_of_two_at_least(d) } else { d }
    });
    let new_w = new_w.unwrap_or_else(|| {
        let d = dimension_with_overlap(w, min_overlap);
        if pow2 { nearest_power_of_two_at_least(d) } else { d }
    });

    if new_h == h && new_w == w {
        return Ok(raster.clone());
    }

    let origin_y = (new_h - h) / 2;
    let origin_x = (new_w - w) / 2;

    let stats = raster
        .stats()
        .ok_or_else(|| crate::error::RegistrationError::DegenerateStats("empty raster".into()))?;

    let mut out = Array2::<f32>::zeros((new_h, new_w));
    let mut mask = Array2::<bool>::from_elem((new_h, new_w), false);
    for y in 0..h {
        for x in 0..w {
            out[[y + origin_y, x + origin_x]] = raster.get(y, x);
            mask[[y + origin_y, x + origin_x]] = true;
        }
    }

    random_noise_mask(&mut out, &mask, Some(stats.median), Some(stats.stddev))?;
    Ok(Raster::new(out, raster.dtype()))
}

/// Crop with clamping; any requested area outside the source bounds is
/// filled with `fill`.
pub fn crop(raster: &Raster, origin_yx: (i64, i64), size_yx: (usize, usize), fill: FillValue) -> Result<Raster> {
    let (src_h, src_w) = raster.shape();
    let (oy, ox) = origin_yx;
    let (new_h, new_w) = size_yx;

    let mut out = Array2::<f32>::zeros((new_h, new_w));
    let mut mask = Array2::<bool>::from_elem((new_h, new_w), false);

    for dy in 0..new_h {
        let sy = oy + dy as i64;
        if sy < 0 || sy as usize >= src_h {
            continue;
        }
        for dx in 0..new_w {
            let sx = ox + dx as i64;
            if sx < 0 || sx as usize >= src_w {
                continue;
            }
            out[[dy, dx]] = raster.get(sy as usize, sx as usize);
            mask[[dy, dx]] = true;
        }
    }

    match fill {
        FillValue::Literal(v) => {
            for (val, &m) in out.iter_mut().zip(mask.iter()) {
                if !m {
                    *val = v;
                }
            }
        }
        FillValue::Random => {
            let have_unmasked = mask.iter().any(|&m| m);
            if have_unmasked {
                // Preserve source-image statistics (spec §9 open question:
                // we fix this ambiguity by always using the *source* image's
                // stats, not the destination crop region's).
                let stats = stats_of(raster.data().iter().copied())
                    .ok_or_else(|| crate::error::RegistrationError::DegenerateStats("empty source raster".into()))?;
                random_noise_mask(&mut out, &mask, Some(stats.median), Some(stats.stddev))?;
            } else if let Some(stats) = raster.stats() {
                random_noise_mask(&mut out, &mask, Some(stats.median), Some(stats.stddev))
                    .unwrap_or(());
                let _ = stats;
            }
        }
    }

    Ok(Raster::new(out, raster.dtype()))
}

/// Row-major grid of `(row, col, tile)`. Source is padded right/bottom to a
/// multiple of `tile_size` with zero fill before tiling.
pub fn image_to_tiles(raster: &Raster, tile_size: (usize, usize), offset: Option<(usize, usize)>) -> Vec<(usize, usize, Raster)> {
    let (h, w) = raster.shape();
    let (tile_h, tile_w) = tile_size;
    let rows = h.div_ceil(tile_h);
    let cols = w.div_ceil(tile_w);
    let (row_off, col_off) = offset.unwrap_or((0, 0));

    let mut tiles = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let y0 = row * tile_h;
            let x0 = col * tile_w;
            let mut tile = Array2::<f32>::zeros((tile_h, tile_w));
            for ty in 0..tile_h {
                let sy = y0 + ty;
                if sy >= h {
                    continue;
                }
                for tx in 0..tile_w {
                    let sx = x0 + tx;
                    if sx >= w {
                        continue;
                    }
                    tile[[ty, tx]] = raster.get(sy, sx);
                }
            }
            tiles.push((row + row_off, col + col_off, Raster::new(tile, raster.dtype())));
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_raster(h: usize, w: usize, val: f32) -> Raster {
        Raster::new(Array2::from_elem((h, w), val), DType::F32)
    }

    #[test]
    fn pad_contains_original_exactly() {
        let raster = flat_raster(16, 16, 0.5);
        let padded = pad_for_phase_correlation(&raster, 0.5, Some(32), Some(32), false).unwrap();
        assert!(padded.height() >= 16);
        assert!(padded.width() >= 16);
        let origin_y = (32 - 16) / 2;
        let origin_x = (32 - 16) / 2;
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(padded.get(y + origin_y, x + origin_x), 0.5);
            }
        }
    }

    #[test]
    fn pow2_rounds_up() {
        assert_eq!(nearest_power_of_two_at_least(17), 32);
        assert_eq!(nearest_power_of_two_at_least(16), 16);
        assert_eq!(nearest_power_of_two_at_least(1), 1);
    }

    #[test]
    fn crop_outside_bounds_is_fill_value() {
        let raster = flat_raster(4, 4, 1.0);
        let cropped = crop(&raster, (10, 10), (4, 4), FillValue::Literal(0.25)).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(cropped.get(y, x), 0.25);
            }
        }
    }

    #[test]
    fn image_to_tiles_row_major_and_padded() {
        let raster = flat_raster(5, 5, 1.0);
        let tiles = image_to_tiles(&raster, (4, 4), None);
        assert_eq!(tiles.len(), 4); // ceil(5/4) = 2 per axis
        assert_eq!(tiles[0].0, 0);
        assert_eq!(tiles[0].1, 0);
        assert_eq!(tiles[3].0, 1);
        assert_eq!(tiles[3].1, 1);
        // Padded region of the bottom-right tile is zero.
        assert_eq!(tiles[3].2.get(3, 3), 0.0);
    }
}
