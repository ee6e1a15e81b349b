//! Phase correlation (spec §4.B), grounded on `FindOffset`/`_FindPeak` in
//! `nornir_imageregistration/core.py`.
//!
//! The original normalizes the cross-power spectrum in the frequency
//! domain and looks for a sharp peak in its inverse transform; a peak near
//! `(0, 0)` (mod image size) means the two images are well aligned once
//! shifted by that offset.

use ndarray::Array2;
use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;

use crate::error::{RegistrationError, Result};
use crate::raster::Raster;

/// 2-D forward FFT via row-wise then column-wise 1-D complex FFTs.
fn fft2(data: &Array2<f32>) -> Array2<Complex32> {
    let (h, w) = (data.shape()[0], data.shape()[1]);
    let mut planner = FftPlanner::<f32>::new();
    let row_fft = planner.plan_fft_forward(w);
    let col_fft = planner.plan_fft_forward(h);

    let mut buf: Array2<Complex32> = data.mapv(|v| Complex32::new(v, 0.0));

    for mut row in buf.rows_mut() {
        let slice = row.as_slice_mut().expect("row is contiguous");
        row_fft.process(slice);
    }

    transpose_inplace(&mut buf);
    for mut row in buf.rows_mut() {
        let slice = row.as_slice_mut().expect("row is contiguous");
        col_fft.process(slice);
    }
    transpose_inplace(&mut buf);

    buf
}

/// 2-D inverse FFT, normalized by `1 / (h * w)`.
fn ifft2(data: &Array2<Complex32>) -> Array2<Complex32> {
    let (h, w) = (data.shape()[0], data.shape()[1]);
    let mut planner = FftPlanner::<f32>::new();
    let row_fft = planner.plan_fft_inverse(w);
    let col_fft = planner.plan_fft_inverse(h);

    let mut buf = data.clone();
    for mut row in buf.rows_mut() {
        let slice = row.as_slice_mut().expect("row is contiguous");
        row_fft.process(slice);
    }
    transpose_inplace(&mut buf);
    for mut row in buf.rows_mut() {
        let slice = row.as_slice_mut().expect("row is contiguous");
        col_fft.process(slice);
    }
    transpose_inplace(&mut buf);

    let scale = 1.0 / (h * w) as f32;
    buf.mapv(|c| c * scale)
}

fn transpose_inplace(data: &mut Array2<Complex32>) {
    let transposed = data.t().to_owned();
    *data = transposed;
}

/// Normalized cross-power spectrum: `(A .* conj(B)) / |A .* conj(B)|`, with
/// a small floor on the denominator to avoid division by zero on exactly
/// matching frequency bins.
fn cross_power_spectrum(a: &Array2<Complex32>, b: &Array2<Complex32>) -> Array2<Complex32> {
    ndarray::Zip::from(a).and(b).map_collect(|&av, &bv| {
        let prod = av * bv.conj();
        let mag = prod.norm();
        if mag < 1e-12 {
            Complex32::new(0.0, 0.0)
        } else {
            prod / mag
        }
    })
}

/// Inverse-FFT of the normalized cross-power spectrum of `a` and `b`. Both
/// rasters must share the same shape (pad with [`crate::raster::padding::pad_for_phase_correlation`]
/// first if not).
pub fn phase_correlate(a: &Raster, b: &Raster) -> Result<Array2<f32>> {
    if a.shape() != b.shape() {
        return Err(RegistrationError::ShapeMismatch { expected: a.shape(), got: b.shape() });
    }

    let fa = fft2(a.data());
    let fb = fft2(b.data());
    let cross = cross_power_spectrum(&fa, &fb);
    let correlation = ifft2(&cross);
    Ok(correlation.mapv(|c| c.re))
}

/// Peak location in a phase-correlation surface, along with its raw value
/// and how far above the mean it sits, used as a confidence weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub y: usize,
    pub x: usize,
    pub value: f32,
    pub weight: f32,
}

/// Locate the highest peak in `correlation`, optionally restricted to cells
/// where `overlap_mask` is `true` (offsets whose implied overlap is too
/// small to trust). `cutoff` is the minimum fraction of the peak value a
/// second-highest peak may reach before the match is considered ambiguous;
/// values below it are still accepted but returned with a reduced weight.
pub fn find_peak(correlation: &Array2<f32>, overlap_mask: Option<&Array2<bool>>, cutoff: f64) -> Result<Peak> {
    let mut best: Option<(usize, usize, f32)> = None;
    let mut second_best = f32::NEG_INFINITY;
    let mut sum = 0.0f64;
    let mut count = 0usize;

    for ((y, x), &v) in correlation.indexed_iter() {
        if let Some(mask) = overlap_mask {
            if !mask[[y, x]] {
                continue;
            }
        }
        sum += v as f64;
        count += 1;

        match best {
            None => best = Some((y, x, v)),
            Some((_, _, bv)) if v > bv => {
                second_best = bv;
                best = Some((y, x, v));
            }
            Some((_, _, bv)) => {
                if v > second_best {
                    second_best = v;
                }
                let _ = bv;
            }
        }
    }

    let (y, x, value) = best.ok_or_else(|| {
        RegistrationError::InsufficientEvidence { surviving: 0, required: 1 }
    })?;

    let mean = if count > 0 { (sum / count as f64) as f32 } else { 0.0 };
    let spread = (value - mean).max(1e-6);
    let ambiguity = if second_best.is_finite() { (second_best / value.max(1e-6)) as f64 } else { 0.0 };
    let weight = if ambiguity > cutoff {
        spread * 0.5
    } else {
        spread
    };

    Ok(Peak { y, x, value, weight })
}

/// Translate a peak's raw grid index into a signed pixel offset, accounting
/// for FFT wraparound: indices in the upper half of each axis represent a
/// negative shift.
fn unwrap_offset(index: usize, dim: usize) -> f64 {
    if index > dim / 2 {
        index as f64 - dim as f64
    } else {
        index as f64
    }
}

/// Estimated `(dy, dx, weight)` translation aligning `moving` onto `fixed`.
pub fn find_offset(fixed: &Raster, moving: &Raster, overlap_mask: Option<&Array2<bool>>, cutoff: f64) -> Result<(f64, f64, f32)> {
    let correlation = phase_correlate(fixed, moving)?;
    let peak = find_peak(&correlation, overlap_mask, cutoff)?;
    let (h, w) = fixed.shape();
    let dy = unwrap_offset(peak.y, h);
    let dx = unwrap_offset(peak.x, w);
    Ok((dy, dx, peak.weight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::DType;

    fn checkerboard(h: usize, w: usize) -> Array2<f32> {
        Array2::from_shape_fn((h, w), |(y, x)| if (y / 4 + x / 4) % 2 == 0 { 1.0 } else { 0.0 })
    }

    fn roll(data: &Array2<f32>, dy: i64, dx: i64) -> Array2<f32> {
        let (h, w) = (data.shape()[0] as i64, data.shape()[1] as i64);
        Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
            let sy = ((y as i64 - dy).rem_euclid(h)) as usize;
            let sx = ((x as i64 - dx).rem_euclid(w)) as usize;
            data[[sy, sx]]
        })
    }

    #[test]
    fn identical_images_peak_at_origin() {
        let data = checkerboard(32, 32);
        let a = Raster::new(data.clone(), DType::F32);
        let b = Raster::new(data, DType::F32);
        let (dy, dx, _) = find_offset(&a, &b, None, 0.995).unwrap();
        assert_eq!(dy, 0.0);
        assert_eq!(dx, 0.0);
    }

    #[test]
    fn known_shift_is_recovered() {
        let data = checkerboard(32, 32);
        let shifted = roll(&data, 5, -3);
        let a = Raster::new(data, DType::F32);
        let b = Raster::new(shifted, DType::F32);
        let (dy, dx, _) = find_offset(&a, &b, None, 0.995).unwrap();
        assert_eq!(dy, 5.0);
        assert_eq!(dx, -3.0);
    }

    #[test]
    fn unwrap_offset_splits_at_half_dimension() {
        assert_eq!(unwrap_offset(0, 32), 0.0);
        assert_eq!(unwrap_offset(16, 32), 16.0);
        assert_eq!(unwrap_offset(17, 32), -15.0);
        assert_eq!(unwrap_offset(31, 32), -1.0);
    }
}
