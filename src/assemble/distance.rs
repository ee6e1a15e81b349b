//! Distance-to-center image computation and caching (spec §4.F / §3),
//! grounded on `CreateDistanceImage`/`__GetOrCreateCachedDistanceImage` in
//! `nornir_imageregistration/assemble_tiles.py`.
//!
//! Every tile's contribution to a composite is weighted by how far each
//! pixel sits from the tile's own center: when tiles overlap, edges lose
//! to the Z-buffer rule and interiors win. The same handful of tile
//! shapes recurs across a whole mosaic, so the buffer is memoized both
//! in-process and on disk, content-addressed by shape (`distance_{h}x{w}`),
//! so a second process assembling the same mosaic doesn't recompute it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use ndarray::Array2;
use once_cell::sync::Lazy;

use crate::raster::{io, DType, Raster};

static IN_PROCESS_CACHE: Lazy<Mutex<HashMap<(usize, usize), Arc<Raster>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Build the `height x width` distance-to-center buffer: each pixel holds
/// its Euclidean distance to the raster's own geometric center.
pub fn create_distance_image(height: usize, width: usize) -> Raster {
    let center_y = height as f64 / 2.0;
    let center_x = width as f64 / 2.0;

    let mut out = Array2::<f32>::zeros((height, width));
    for y in 0..height {
        let dy = y as f64 - center_y;
        for x in 0..width {
            let dx = x as f64 - center_x;
            out[[y, x]] = (dy * dy + dx * dx).sqrt() as f32;
        }
    }
    Raster::new(out, DType::F32)
}

/// Fetch a cached distance image for `shape`, building (and, if
/// `scratch_dir` is given, persisting) one on first use. Later calls with
/// the same shape hit the in-process cache first, then the on-disk one.
pub fn get_or_create_distance_image(shape: (usize, usize), scratch_dir: Option<&Path>) -> Raster {
    if let Some(cached) = IN_PROCESS_CACHE.lock().expect("distance image cache poisoned").get(&shape) {
        return (**cached).clone();
    }

    if let Some(dir) = scratch_dir {
        let path = dir.join(format!("distance_{}x{}.npy", shape.0, shape.1));
        if let Ok(loaded) = io::load(&path, None, None) {
            if loaded.shape() == shape {
                IN_PROCESS_CACHE.lock().expect("distance image cache poisoned").insert(shape, Arc::new(loaded.clone()));
                return loaded;
            }
        }
    }

    let image = create_distance_image(shape.0, shape.1);

    if let Some(dir) = scratch_dir {
        let path = dir.join(format!("distance_{}x{}.npy", shape.0, shape.1));
        if let Err(err) = io::save(&path, &image, None) {
            log::warn!("failed to persist distance image cache at {}: {err}", path.display());
        }
    }

    IN_PROCESS_CACHE.lock().expect("distance image cache poisoned").insert(shape, Arc::new(image.clone()));
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_zero_at_even_center_and_grows_outward() {
        let image = create_distance_image(4, 4);
        let center = image.get(2, 2);
        let corner = image.get(0, 0);
        assert!(corner > center);
    }

    #[test]
    fn cached_lookup_matches_freshly_built_image() {
        let fresh = create_distance_image(17, 9);
        let cached = get_or_create_distance_image((17, 9), None);
        for y in 0..17 {
            for x in 0..9 {
                assert!((fresh.get(y, x) - cached.get(y, x)).abs() < 1e-6);
            }
        }
    }
}
