//! Image primitives & padding (spec §4.A).
//!
//! [`Raster`] is the crate's canonical in-memory image: always a
//! row-major `f32` buffer in `[0, 1]` for registration math, tagged
//! with the [`DType`] it was decoded from so `save` can re-quantize to
//! the same bit depth.

pub mod io;
pub mod noise;
pub mod padding;

use ndarray::Array2;

/// Closed enumeration of element types the original numpy-dtype
/// polymorphism collapses to (spec §9 design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    U8,
    U16,
    I16,
    I32,
    F16,
    F32,
    F64,
}

impl DType {
    /// Maximum integer value representable by this dtype, used to scale
    /// `[0, 1]` float data back to its natural range on save.
    pub fn int_max(&self) -> f64 {
        match self {
            DType::U8 => u8::MAX as f64,
            DType::U16 => u16::MAX as f64,
            DType::I16 => i16::MAX as f64,
            DType::I32 => i32::MAX as f64,
            DType::F16 | DType::F32 | DType::F64 => 1.0,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DType::U8 | DType::U16 | DType::I16 | DType::I32)
    }
}

/// A single-channel 2-D raster, indexed `(row, col) == (y, x)`.
///
/// Internally always `f32`. Integer sources are normalized to `[0, 1]`
/// on load (spec §4.A); the original [`DType`] is retained so `save`
/// can re-quantize.
#[derive(Debug, Clone)]
pub struct Raster {
    data: Array2<f32>,
    dtype: DType,
}

impl Raster {
    pub fn new(data: Array2<f32>, dtype: DType) -> Self {
        Self { data, dtype }
    }

    pub fn zeros(height: usize, width: usize, dtype: DType) -> Self {
        Self { data: Array2::zeros((height, width)), dtype }
    }

    pub fn shape(&self) -> (usize, usize) {
        let s = self.data.shape();
        (s[0], s[1])
    }

    pub fn height(&self) -> usize {
        self.shape().0
    }

    pub fn width(&self) -> usize {
        self.shape().1
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<f32> {
        &mut self.data
    }

    pub fn into_data(self) -> Array2<f32> {
        self.data
    }

    pub fn get(&self, y: usize, x: usize) -> f32 {
        self.data[[y, x]]
    }

    /// Sample statistics over the entire raster: (min, max, median, stddev).
    pub fn stats(&self) -> Option<RasterStats> {
        stats_of(self.data.iter().copied())
    }
}

/// Basic descriptive statistics used to parameterize matched gaussian noise.
#[derive(Debug, Clone, Copy)]
pub struct RasterStats {
    pub min: f32,
    pub max: f32,
    pub median: f32,
    pub stddev: f32,
}

/// Compute [`RasterStats`] over an arbitrary pixel iterator. Returns `None`
/// if the iterator is empty (the caller should raise `DegenerateStats`).
pub fn stats_of(values: impl Iterator<Item = f32>) -> Option<RasterStats> {
    let mut sorted: Vec<f32> = values.collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let n = sorted.len();
    let min = sorted[0];
    let max = sorted[n - 1];
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    let mean = sorted.iter().sum::<f32>() / n as f32;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n as f32;
    let stddev = variance.sqrt();

    Some(RasterStats { min, max, median, stddev })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_constant_image() {
        let values = vec![0.5f32; 100];
        let stats = stats_of(values.into_iter()).unwrap();
        assert_eq!(stats.min, 0.5);
        assert_eq!(stats.max, 0.5);
        assert_eq!(stats.median, 0.5);
        assert_eq!(stats.stddev, 0.0);
    }

    #[test]
    fn stats_of_empty_is_none() {
        assert!(stats_of(std::iter::empty()).is_none());
    }
}
