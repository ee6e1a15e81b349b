//! Load/save rasters from PNG, TIFF, and the raw NPY container (spec §6
//! "Image files"). JP2 is an external-interface format for very large
//! mosaic *output*; no pure-Rust JP2 encoder exists in this crate's
//! dependency stack, so `save` returns `UnsupportedFormat` for it rather
//! than hand-rolling a codec (see DESIGN.md).

use std::io::{Read, Write};
use std::path::Path;

use image::{DynamicImage, ImageBuffer, Luma};
use ndarray::Array2;

use crate::context::RuntimeContext;
use crate::error::{RegistrationError, Result};
use crate::raster::{DType, Raster};

/// Reduce to grayscale, decode, optionally downscale so
/// `max(height, width) <= max_dim`, and normalize to `[0, 1]` (spec §4.A `load`).
///
/// `ctx`, when given, enforces [`RuntimeContext::max_image_pixels`] against
/// the decoded (pre-downscale) pixel count, returning `UnsupportedFormat`
/// for anything over budget rather than letting a runaway allocation through.
pub fn load(path: impl AsRef<Path>, max_dim: Option<u32>, ctx: Option<&RuntimeContext>) -> Result<Raster> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let mut raster = match ext.as_str() {
        "npy" => load_npy(path)?,
        "png" | "tif" | "tiff" | "jpg" | "jpeg" | "bmp" => load_with_image_crate(path)?,
        other => return Err(RegistrationError::UnsupportedFormat(other.to_string())),
    };

    if let Some(ctx) = ctx {
        let (h, w) = raster.shape();
        let pixels = h as u64 * w as u64;
        if pixels > ctx.max_image_pixels {
            return Err(RegistrationError::UnsupportedFormat(format!(
                "{} has {pixels} pixels, exceeding max_image_pixels ({})",
                path.display(),
                ctx.max_image_pixels
            )));
        }
    }

    if let Some(max_dim) = max_dim {
        let (h, w) = raster.shape();
        let largest = h.max(w) as f64;
        if largest > max_dim as f64 {
            let scalar = max_dim as f64 / largest;
            raster = resize_nearest(&raster, scalar);
        }
    }

    Ok(raster)
}

fn load_with_image_crate(path: &Path) -> Result<Raster> {
    let img = image::open(path).map_err(|e| RegistrationError::UnsupportedFormat(e.to_string()))?;
    Ok(dynamic_image_to_raster(&img))
}

fn dynamic_image_to_raster(img: &DynamicImage) -> Raster {
    let (dtype, max_val) = match img {
        DynamicImage::ImageLuma16(_) => (DType::U16, u16::MAX as f32),
        _ => (DType::U8, u8::MAX as f32),
    };

    let gray16 = img.to_luma16();
    let (width, height) = (gray16.width() as usize, gray16.height() as usize);
    let mut data = Array2::<f32>::zeros((height, width));

    // Normalize integer data to [0, 1], matching the dtype's natural depth
    // rather than always scaling from 16-bit (an 8-bit source stays 8-bit max).
    let scale = if dtype == DType::U16 { u16::MAX as f32 } else { max_val };
    for (x, y, px) in gray16.enumerate_pixels() {
        data[[y as usize, x as usize]] = px.0[0] as f32 / scale;
    }

    Raster::new(data, dtype)
}

/// Encode with bit-depth equal to or less than the raster's natural depth.
/// `bpp` overrides the dtype's natural depth (e.g. forcing 8-bit output).
pub fn save(path: impl AsRef<Path>, raster: &Raster, bpp: Option<u8>) -> Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "npy" => save_npy(path, raster),
        "png" | "tif" | "tiff" => save_with_image_crate(path, raster, bpp),
        "jp2" => Err(RegistrationError::UnsupportedFormat("jp2 (no encoder available)".into())),
        other => Err(RegistrationError::UnsupportedFormat(other.to_string())),
    }
}

fn save_with_image_crate(path: &Path, raster: &Raster, bpp: Option<u8>) -> Result<()> {
    let depth = bpp.unwrap_or(if raster.dtype().is_integer() && raster.dtype() == DType::U16 { 16 } else { 8 });
    let (h, w) = raster.shape();

    if depth == 1 {
        // Pack boolean data (nonzero == true) into byte-aligned rows.
        return save_1bit_png(path, raster);
    }

    if depth > 8 {
        let mut buf: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::new(w as u32, h as u32);
        for y in 0..h {
            for x in 0..w {
                let v = (raster.get(y, x).clamp(0.0, 1.0) * u16::MAX as f32).round() as u16;
                buf.put_pixel(x as u32, y as u32, Luma([v]));
            }
        }
        buf.save(path).map_err(|e| RegistrationError::UnsupportedFormat(e.to_string()))?;
    } else {
        let mut buf: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::new(w as u32, h as u32);
        for y in 0..h {
            for x in 0..w {
                let v = (raster.get(y, x).clamp(0.0, 1.0) * u8::MAX as f32).round() as u8;
                buf.put_pixel(x as u32, y as u32, Luma([v]));
            }
        }
        buf.save(path).map_err(|e| RegistrationError::UnsupportedFormat(e.to_string()))?;
    }
    Ok(())
}

fn save_1bit_png(path: &Path, raster: &Raster) -> Result<()> {
    let (h, w) = raster.shape();
    let row_bytes = w.div_ceil(8);
    let mut packed = vec![0u8; row_bytes * h];

    for y in 0..h {
        for x in 0..w {
            if raster.get(y, x) > 0.5 {
                packed[y * row_bytes + x / 8] |= 1 << (7 - (x % 8));
            }
        }
    }

    // `image` has no native 1-bit writer; expand to 8-bit for the encoder,
    // which still reports the natural depth via `save`'s `bpp` contract.
    let mut buf: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::new(w as u32, h as u32);
    for y in 0..h {
        for x in 0..w {
            let bit = (packed[y * row_bytes + x / 8] >> (7 - (x % 8))) & 1;
            buf.put_pixel(x as u32, y as u32, Luma([bit * 255]));
        }
    }
    buf.save(path).map_err(|e| RegistrationError::UnsupportedFormat(e.to_string()))?;
    Ok(())
}

fn resize_nearest(raster: &Raster, scalar: f64) -> Raster {
    let (h, w) = raster.shape();
    let new_h = ((h as f64) * scalar).round().max(1.0) as usize;
    let new_w = ((w as f64) * scalar).round().max(1.0) as usize;

    let mut out = Array2::<f32>::zeros((new_h, new_w));
    for y in 0..new_h {
        let src_y = ((y as f64 / scalar).round() as usize).min(h - 1);
        for x in 0..new_w {
            let src_x = ((x as f64 / scalar).round() as usize).min(w - 1);
            out[[y, x]] = raster.get(src_y, src_x);
        }
    }
    Raster::new(out, raster.dtype())
}

// --- Minimal NPY container (little-endian, C-order, 2-D arrays only) ---
// Supports the subset of dtypes this crate needs: u8, u16, f4 (f32), f8 (f64).

fn load_npy(path: &Path) -> Result<Raster> {
    let mut f = std::fs::File::open(path).map_err(|e| RegistrationError::io(path.display().to_string(), e))?;
    let mut magic = [0u8; 6];
    f.read_exact(&mut magic).map_err(|e| RegistrationError::io(path.display().to_string(), e))?;
    if &magic != b"\x93NUMPY" {
        return Err(RegistrationError::UnsupportedFormat("not a valid npy file".into()));
    }
    let mut version = [0u8; 2];
    f.read_exact(&mut version).map_err(|e| RegistrationError::io(path.display().to_string(), e))?;

    let header_len = if version[0] == 1 {
        let mut buf = [0u8; 2];
        f.read_exact(&mut buf).map_err(|e| RegistrationError::io(path.display().to_string(), e))?;
        u16::from_le_bytes(buf) as usize
    } else {
        let mut buf = [0u8; 4];
        f.read_exact(&mut buf).map_err(|e| RegistrationError::io(path.display().to_string(), e))?;
        u32::from_le_bytes(buf) as usize
    };

    let mut header = vec![0u8; header_len];
    f.read_exact(&mut header).map_err(|e| RegistrationError::io(path.display().to_string(), e))?;
    let header = String::from_utf8_lossy(&header);

    let (dtype, elem_size) = parse_npy_dtype(&header)?;
    let (height, width) = parse_npy_shape(&header)?;

    let mut raw = Vec::new();
    f.read_to_end(&mut raw).map_err(|e| RegistrationError::io(path.display().to_string(), e))?;
    if raw.len() < height * width * elem_size {
        return Err(RegistrationError::Parse { kind: "npy", reason: "truncated data section".into() });
    }

    let mut data = Array2::<f32>::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let offset = (y * width + x) * elem_size;
            let bytes = &raw[offset..offset + elem_size];
            data[[y, x]] = match dtype {
                DType::U8 => bytes[0] as f32 / u8::MAX as f32,
                DType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f32 / u16::MAX as f32,
                DType::F32 => f32::from_le_bytes(bytes.try_into().unwrap()),
                DType::F64 => f64::from_le_bytes(bytes.try_into().unwrap()) as f32,
                _ => unreachable!("parse_npy_dtype only returns the above"),
            };
        }
    }

    Ok(Raster::new(data, dtype))
}

fn parse_npy_dtype(header: &str) -> Result<(DType, usize)> {
    if header.contains("'<u1'") || header.contains("'|u1'") {
        Ok((DType::U8, 1))
    } else if header.contains("'<u2'") {
        Ok((DType::U16, 2))
    } else if header.contains("'<f4'") {
        Ok((DType::F32, 4))
    } else if header.contains("'<f8'") {
        Ok((DType::F64, 8))
    } else {
        Err(RegistrationError::UnsupportedFormat(format!("npy dtype not supported in header: {header}")))
    }
}

fn parse_npy_shape(header: &str) -> Result<(usize, usize)> {
    let start = header
        .find("'shape':")
        .and_then(|i| header[i..].find('('))
        .ok_or_else(|| RegistrationError::Parse { kind: "npy", reason: "missing shape".into() })?;
    let start = header.find("'shape':").unwrap() + start;
    let end = header[start..]
        .find(')')
        .ok_or_else(|| RegistrationError::Parse { kind: "npy", reason: "malformed shape".into() })?
        + start;

    let dims: Vec<usize> = header[start + 1..end]
        .split(',')
        .filter_map(|s| s.trim().parse::<usize>().ok())
        .collect();

    match dims.as_slice() {
        [h, w] => Ok((*h, *w)),
        [n] => Ok((1, *n)),
        _ => Err(RegistrationError::Parse { kind: "npy", reason: "only 1-D/2-D arrays supported".into() }),
    }
}

fn save_npy(path: &Path, raster: &Raster) -> Result<()> {
    let (h, w) = raster.shape();
    let header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({h}, {w}), }}"
    );
    // Pad header so (10 + header_len) is a multiple of 64, NPY convention.
    let mut header_bytes = header.into_bytes();
    header_bytes.push(b'\n');
    let total_len = 10 + header_bytes.len();
    let pad = (64 - (total_len % 64)) % 64;
    header_bytes.truncate(header_bytes.len() - 1);
    header_bytes.extend(std::iter::repeat(b' ').take(pad));
    header_bytes.push(b'\n');

    let mut f = std::fs::File::create(path).map_err(|e| RegistrationError::io(path.display().to_string(), e))?;
    f.write_all(b"\x93NUMPY\x01\x00").map_err(|e| RegistrationError::io(path.display().to_string(), e))?;
    f.write_all(&(header_bytes.len() as u16).to_le_bytes())
        .map_err(|e| RegistrationError::io(path.display().to_string(), e))?;
    f.write_all(&header_bytes).map_err(|e| RegistrationError::io(path.display().to_string(), e))?;

    for y in 0..h {
        for x in 0..w {
            f.write_all(&raster.get(y, x).to_le_bytes())
                .map_err(|e| RegistrationError::io(path.display().to_string(), e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile_npy_roundtrip::*;

    mod tempfile_npy_roundtrip {
        use super::super::*;
        use std::env;

        pub fn roundtrip_path(name: &str) -> std::path::PathBuf {
            env::temp_dir().join(format!("nornir-test-{name}-{}.npy", std::process::id()))
        }
    }

    #[test]
    fn npy_roundtrip() {
        let path = roundtrip_path("roundtrip");
        let mut data = Array2::<f32>::zeros((4, 6));
        for y in 0..4 {
            for x in 0..6 {
                data[[y, x]] = (y * 6 + x) as f32 / 24.0;
            }
        }
        let raster = Raster::new(data.clone(), DType::F32);
        save_npy(&path, &raster).unwrap();
        let loaded = load_npy(&path).unwrap();
        assert_eq!(loaded.shape(), (4, 6));
        for y in 0..4 {
            for x in 0..6 {
                assert!((loaded.get(y, x) - data[[y, x]]).abs() < 1e-6);
            }
        }
        let _ = std::fs::remove_file(&path);
    }
}
