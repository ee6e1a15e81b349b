//! Gaussian noise fill helpers (spec §4.A `random_noise_mask`,
//! `replace_extrema_with_noise`), grounded on `ReplaceImageExtramaWithNoise`
//! and `RandomNoiseMask` in `nornir_imageregistration/core.py`.

use ndarray::Array2;
use rand_distr::{Distribution, Normal};

use crate::error::{RegistrationError, Result};
use crate::raster::{stats_of, Raster, RasterStats};

/// Deterministic RNG seed so repeated calls against identical data, e.g. in
/// tests, produce repeatable noise without needing to thread a seed through
/// every public call site.
fn rng_for(seed_data: &Array2<f32>) -> rand_chacha_shim::ChaChaLike {
    rand_chacha_shim::ChaChaLike::from_shape(seed_data.dim())
}

/// Thin wrapper so swapping the RNG implementation later doesn't ripple
/// through every call site; backed by `rand::rngs::StdRng` seeded from the
/// array shape (deterministic, not security-sensitive).
mod rand_chacha_shim {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub type ChaChaLike = StdRng;

    pub trait FromShape {
        fn from_shape(dim: (usize, usize)) -> Self;
    }

    impl FromShape for StdRng {
        fn from_shape(dim: (usize, usize)) -> Self {
            let seed = (dim.0 as u64).wrapping_mul(0x9E3779B97F4A7C15) ^ (dim.1 as u64);
            StdRng::seed_from_u64(seed)
        }
    }
}

/// Replace pixels where `mask` is `false` with a gaussian sample matching
/// the unmasked region's median/stddev, clipped to the unmasked region's
/// min/max. Computes median/stddev from the unmasked region when not
/// supplied.
pub fn random_noise_mask(
    raster: &mut Array2<f32>,
    mask: &Array2<bool>,
    median: Option<f32>,
    stddev: Option<f32>,
) -> Result<()> {
    if raster.dim() != mask.dim() {
        return Err(RegistrationError::ShapeMismatch { expected: raster.dim(), got: mask.dim() });
    }

    let unmasked_count = mask.iter().filter(|&&m| m).count();
    if unmasked_count == 0 {
        return Err(RegistrationError::DegenerateStats(
            "entire image is masked, cannot calculate median or standard deviation".into(),
        ));
    }

    let stats = match (median, stddev) {
        (Some(m), Some(s)) => {
            let (min, max) = unmasked_min_max(raster, mask);
            RasterStats { min, max, median: m, stddev: s }
        }
        _ => stats_of(raster.iter().zip(mask.iter()).filter(|(_, &m)| m).map(|(&v, _)| v))
            .ok_or_else(|| RegistrationError::DegenerateStats("entire image is masked".into()))?,
    };

    fill_masked_with_noise(raster, mask, stats);
    Ok(())
}

/// Replace pixels equal to the global min or max with gaussian noise
/// (independently for each extremum), useful when aligning images
/// composed mostly of saturated/black regions.
pub fn replace_extrema_with_noise(raster: &mut Array2<f32>) -> Result<()> {
    let stats = stats_of(raster.iter().copied())
        .ok_or_else(|| RegistrationError::DegenerateStats("empty raster".into()))?;

    let mut mask = Array2::<bool>::from_elem(raster.dim(), true);
    for ((y, x), &v) in raster.indexed_iter() {
        if v == stats.min || v == stats.max {
            mask[[y, x]] = false;
        }
    }

    fill_masked_with_noise(raster, &mask, stats);
    Ok(())
}

fn unmasked_min_max(raster: &Array2<f32>, mask: &Array2<bool>) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for (&v, &m) in raster.iter().zip(mask.iter()) {
        if m {
            min = min.min(v);
            max = max.max(v);
        }
    }
    (min, max)
}

fn fill_masked_with_noise(raster: &mut Array2<f32>, mask: &Array2<bool>, stats: RasterStats) {
    let dist = if stats.stddev > 0.0 {
        Normal::new(stats.median, stats.stddev).unwrap()
    } else {
        // Degenerate (constant) source: every sample is exactly the median.
        Normal::new(stats.median, 1e-6).unwrap()
    };
    let mut rng = rng_for(raster);

    for (v, &m) in raster.iter_mut().zip(mask.iter()) {
        if !m {
            let sample = dist.sample(&mut rng) as f32;
            *v = sample.clamp(stats.min, stats.max);
        }
    }
}
