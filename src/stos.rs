//! STOS/mosaic text persistence (spec §4.H / §6), grounded on the line-based
//! `.stos`/`.mosaic` readers in `nornir_imageregistration/io/stosfile.py`
//! and `mosaicfile.py`.
//!
//! Both formats are flat, line-oriented text: a STOS file is one registered
//! pair (header + one transform line), a mosaic file is a list of
//! `image_name -> transform_text_line` entries. Neither format embeds a
//! schema version or checksum, so parsing is strict about field counts and
//! rejects the `1.79e308` sentinel upstream tools emit for a failed solve.

use indexmap::IndexMap;

use crate::error::{RegistrationError, Result};
use crate::geometry::Rectangle;
use crate::transform::control_points::ControlPoints;
use crate::transform::grid::GridTransform;
use crate::transform::mesh::MeshTransform;
use crate::transform::rigid::RigidTransform;
use crate::transform::similarity::SimilarityTransform;
use crate::transform::{AnyTransform, Transform};

/// Upstream tools write this value in place of a control point's coordinate
/// when a solve failed to converge; loading must treat it as a parse error
/// rather than silently serving `f64::MAX`-adjacent geometry downstream.
const SENTINEL_MAGNITUDE: f64 = 1.79e308;

/// One registered target/source image pair, matching a single `.stos` file.
#[derive(Debug, Clone)]
pub struct StosPair {
    pub source_image_path: String,
    pub target_image_path: String,
    pub target_mask_path: Option<String>,
    pub source_mask_path: Option<String>,
    pub downsample: u32,
    pub target_size: (u32, u32),
    pub source_size: (u32, u32),
    pub transform: AnyTransform,
}

fn parse_number(token: &str) -> Result<f64> {
    let value: f64 = token.parse().map_err(|_| RegistrationError::Parse {
        kind: "transform literal",
        reason: format!("not a number: {token:?}"),
    })?;
    if !value.is_finite() || value.abs() > SENTINEL_MAGNITUDE {
        return Err(RegistrationError::InvalidTransformLiteral(token.to_string()));
    }
    Ok(value)
}

fn parse_numbers<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<Vec<f64>> {
    tokens.map(parse_number).collect()
}

/// Format a value with `digits` decimal places, trimming to the shortest
/// representation that still preserves them (spec §6 numeric width rule).
fn format_fixed(value: f64, digits: usize) -> String {
    format!("{value:.digits$}")
}

fn write_transform_line(transform: &AnyTransform) -> String {
    match transform {
        AnyTransform::Rigid(t) => write_rigid(t),
        AnyTransform::Similarity(t) => write_similarity(t),
        AnyTransform::Mesh(t) => write_mesh(t),
        AnyTransform::Grid(t) => write_grid(t),
    }
}

fn write_rigid(t: &RigidTransform) -> String {
    let (ty, tx) = t.translation();
    let (cy, cx) = t.rotation_center();
    format!(
        "Rigid2DTransform_double_2_2 vp 3 {} {} {} fp 2 {} {}",
        format_fixed(t.angle(), 3),
        format_fixed(tx, 3),
        format_fixed(ty, 3),
        format_fixed(cx, 3),
        format_fixed(cy, 3),
    )
}

fn write_similarity(t: &SimilarityTransform) -> String {
    let (ty, tx) = t.translation();
    let (cy, cx) = t.rotation_center();
    format!(
        "CenteredSimilarity2DTransform_double_2_2 vp 6 {} {} {} {} {} {} fp 2 {} {}",
        format_fixed(t.intrinsic_scale(), 3),
        format_fixed(t.angle(), 3),
        format_fixed(cx, 3),
        format_fixed(cy, 3),
        format_fixed(tx, 3),
        format_fixed(ty, 3),
        format_fixed(cx, 3),
        format_fixed(cy, 3),
    )
}

/// Mesh control points are written as `(mx, my, cx, cy)`: `mx`/`my` are the
/// warped (mapped/source) coordinate normalised against the warped bounding
/// box (10 decimal digits), `cx`/`cy` are the raw fixed (target/control)
/// coordinate (3 decimal digits), matching `factory.py`'s
/// `_TransformToIRToolsString`, where `Control` is target-space and
/// `Mapped` is source-space normalised by its own bounding box.
fn write_mesh(t: &MeshTransform) -> String {
    let cp = t.control_points();
    let n = cp.len();
    let bbox = t.bounding_box();
    let (left, bottom, width, height) = (bbox.min_x, bbox.min_y, bbox.width, bbox.height);

    let mut vp_terms = Vec::with_capacity(4 * n);
    for (&(cy, cx), &(my, mx)) in cp.fixed_points().iter().zip(cp.warped_points()) {
        let norm_x = if width.abs() > 1e-12 { (mx - left) / width } else { 0.0 };
        let norm_y = if height.abs() > 1e-12 { (my - bottom) / height } else { 0.0 };
        vp_terms.push(format_fixed(norm_x, 10));
        vp_terms.push(format_fixed(norm_y, 10));
        vp_terms.push(format_fixed(cx, 3));
        vp_terms.push(format_fixed(cy, 3));
    }

    format!(
        "MeshTransform_double_2_2 vp {} {} fp 8 0 16 16 {} {} {} {} {}",
        4 * n,
        vp_terms.join(" "),
        format_fixed(left, 3),
        format_fixed(bottom, 3),
        format_fixed(width, 3),
        format_fixed(height, 3),
        n,
    )
}

/// Grid control points are written as raw fixed (target/control) coordinates
/// only; the warped (mapped/source) lattice is never stored directly, a
/// loader reconstructs it from the regular `rows x cols` index spread over
/// the warped bounding box's `width`/`height` (`fp[5]`/`fp[6]`), matching
/// `factory.py`'s `ParseGridTransform`.
fn write_grid(t: &GridTransform) -> String {
    let n = t.fixed_points().len();
    let mut vp_terms = Vec::with_capacity(2 * n);
    for &(cy, cx) in t.fixed_points() {
        vp_terms.push(format_fixed(cx, 3));
        vp_terms.push(format_fixed(cy, 3));
    }

    let bbox = t.bounding_box();
    format!(
        "GridTransform_double_2_2 vp {} {} fp 7 0 {} {} {} {} {} {}",
        2 * n,
        vp_terms.join(" "),
        t.rows().saturating_sub(1),
        t.cols().saturating_sub(1),
        format_fixed(bbox.min_x, 3),
        format_fixed(bbox.min_y, 3),
        format_fixed(bbox.width, 3),
        format_fixed(bbox.height, 3),
    )
}

fn expect_token<'a>(tokens: &mut impl Iterator<Item = &'a str>, what: &'static str) -> Result<&'a str> {
    tokens.next().ok_or(RegistrationError::Parse { kind: "transform literal", reason: format!("missing {what}") })
}

fn expect_tag<'a>(tokens: &mut impl Iterator<Item = &'a str>, tag: &'static str) -> Result<()> {
    let found = expect_token(tokens, tag)?;
    if found != tag {
        return Err(RegistrationError::Parse { kind: "transform literal", reason: format!("expected {tag:?}, got {found:?}") });
    }
    Ok(())
}

fn expect_count<'a>(tokens: &mut impl Iterator<Item = &'a str>, expected: usize, what: &'static str) -> Result<()> {
    let token = expect_token(tokens, what)?;
    let count: usize = token.parse().map_err(|_| RegistrationError::Parse { kind: "transform literal", reason: format!("bad {what} count: {token:?}") })?;
    if count != expected {
        return Err(RegistrationError::Parse {
            kind: "transform literal",
            reason: format!("{what} count mismatch: expected {expected}, got {count}"),
        });
    }
    Ok(())
}

/// Parse one transform-line record (spec §6 "Transform line").
pub fn parse_transform_line(line: &str) -> Result<AnyTransform> {
    let mut tokens = line.split_whitespace();
    let kind = expect_token(&mut tokens, "transform tag")?;

    match kind {
        "Rigid2DTransform_double_2_2" => {
            expect_tag(&mut tokens, "vp")?;
            expect_count(&mut tokens, 3, "vp")?;
            let vp = parse_numbers((&mut tokens).take(3))?;
            expect_tag(&mut tokens, "fp")?;
            expect_count(&mut tokens, 2, "fp")?;
            let fp = parse_numbers((&mut tokens).take(2))?;

            let (angle, tx, ty) = (vp[0], vp[1], vp[2]);
            let (cx, cy) = (fp[0], fp[1]);
            let bbox = Rectangle::new(0.0, 0.0, 0.0, 0.0);
            Ok(AnyTransform::Rigid(RigidTransform::new(angle, (ty, tx), (cy, cx), bbox)))
        }
        "CenteredSimilarity2DTransform_double_2_2" => {
            expect_tag(&mut tokens, "vp")?;
            expect_count(&mut tokens, 6, "vp")?;
            let vp = parse_numbers((&mut tokens).take(6))?;
            expect_tag(&mut tokens, "fp")?;
            expect_count(&mut tokens, 2, "fp")?;
            let _fp = parse_numbers((&mut tokens).take(2))?;

            let (scale, angle, cx, cy, tx, ty) = (vp[0], vp[1], vp[2], vp[3], vp[4], vp[5]);
            let bbox = Rectangle::new(0.0, 0.0, 0.0, 0.0);
            Ok(AnyTransform::Similarity(SimilarityTransform::new(angle, scale, (ty, tx), (cy, cx), bbox)))
        }
        "MeshTransform_double_2_2" => {
            expect_tag(&mut tokens, "vp")?;
            let vp_count_token = expect_token(&mut tokens, "vp count")?;
            let vp_count: usize = vp_count_token
                .parse()
                .map_err(|_| RegistrationError::Parse { kind: "transform literal", reason: format!("bad vp count: {vp_count_token:?}") })?;
            let vp = parse_numbers((&mut tokens).take(vp_count))?;
            expect_tag(&mut tokens, "fp")?;
            expect_count(&mut tokens, 8, "fp")?;
            let fp = parse_numbers((&mut tokens).take(8))?;
            let n = fp[7] as usize;

            if vp_count != 4 * n {
                return Err(RegistrationError::Parse {
                    kind: "transform literal",
                    reason: format!("mesh vp count {vp_count} inconsistent with point count {n}"),
                });
            }

            let (left, bottom, width, height) = (fp[3], fp[4], fp[5], fp[6]);
            let mut fixed = Vec::with_capacity(n);
            let mut warped = Vec::with_capacity(n);
            for chunk in vp.chunks_exact(4) {
                let (norm_x, norm_y, cx, cy) = (chunk[0], chunk[1], chunk[2], chunk[3]);
                let mapped_x = norm_x * width + left;
                let mapped_y = norm_y * height + bottom;
                fixed.push((cy, cx));
                warped.push((mapped_y, mapped_x));
            }

            let control_points = ControlPoints::from_pairs(fixed, warped)?;
            Ok(AnyTransform::Mesh(MeshTransform::new(control_points)?))
        }
        "GridTransform_double_2_2" => {
            expect_tag(&mut tokens, "vp")?;
            let vp_count_token = expect_token(&mut tokens, "vp count")?;
            let vp_count: usize = vp_count_token
                .parse()
                .map_err(|_| RegistrationError::Parse { kind: "transform literal", reason: format!("bad vp count: {vp_count_token:?}") })?;
            let vp = parse_numbers((&mut tokens).take(vp_count))?;
            expect_tag(&mut tokens, "fp")?;
            expect_count(&mut tokens, 7, "fp")?;
            let fp = parse_numbers((&mut tokens).take(7))?;

            let rows = fp[1] as usize + 1;
            let cols = fp[2] as usize + 1;
            if vp_count != 2 * rows * cols {
                return Err(RegistrationError::Parse {
                    kind: "transform literal",
                    reason: format!("grid vp count {vp_count} inconsistent with {rows}x{cols} lattice"),
                });
            }

            let (width, height) = (fp[5], fp[6]);
            let mut fixed = Vec::with_capacity(rows * cols);
            for chunk in vp.chunks_exact(2) {
                fixed.push((chunk[1], chunk[0]));
            }

            // The warped (mapped/source) lattice isn't stored; it is a regular
            // grid spread over the mapped bounding box's width/height by
            // index fraction, per `factory.py`'s `ParseGridTransform` (no
            // left/bottom offset is added here; the source is consistent
            // about that, unlike the mesh format).
            let mut warped = Vec::with_capacity(rows * cols);
            for r in 0..rows {
                for c in 0..cols {
                    let my = (r as f64 / (rows - 1) as f64) * height;
                    let mx = (c as f64 / (cols - 1) as f64) * width;
                    warped.push((my, mx));
                }
            }

            Ok(AnyTransform::Grid(GridTransform::new(rows, cols, warped, fixed)?))
        }
        other => Err(RegistrationError::Parse { kind: "transform literal", reason: format!("unknown transform tag: {other:?}") }),
    }
}

/// Serialize a [`StosPair`] to the full line-based `.stos` text body.
pub fn write_stos(pair: &StosPair) -> String {
    let mode = if pair.target_mask_path.is_some() || pair.source_mask_path.is_some() { 1 } else { 0 };
    let mut lines = vec![mode.to_string(), pair.source_image_path.clone(), pair.target_image_path.clone()];
    if mode == 1 {
        lines.push(pair.target_mask_path.clone().unwrap_or_default());
        lines.push(pair.source_mask_path.clone().unwrap_or_default());
    }
    lines.push(pair.downsample.to_string());
    lines.push(format!("{} {}", pair.target_size.0, pair.target_size.1));
    lines.push(format!("{} {}", pair.source_size.0, pair.source_size.1));
    lines.push(write_transform_line(&pair.transform));
    lines.join("\n")
}

/// Parse a full `.stos` file body (spec §6 "STOS file format").
pub fn parse_stos(text: &str) -> Result<StosPair> {
    let mut lines = text.lines();
    let mode: u32 = expect_token(&mut std::iter::once(lines.next().unwrap_or_default().trim()), "mode")?
        .parse()
        .map_err(|_| RegistrationError::Parse { kind: "stos", reason: "bad mode line".into() })?;

    let source_image_path = lines.next().ok_or(RegistrationError::Parse { kind: "stos", reason: "missing source image path".into() })?.to_string();
    let target_image_path = lines.next().ok_or(RegistrationError::Parse { kind: "stos", reason: "missing target image path".into() })?.to_string();

    let (target_mask_path, source_mask_path) = if mode == 1 {
        let t = lines.next().ok_or(RegistrationError::Parse { kind: "stos", reason: "missing target mask path".into() })?.to_string();
        let s = lines.next().ok_or(RegistrationError::Parse { kind: "stos", reason: "missing source mask path".into() })?.to_string();
        (Some(t), Some(s))
    } else if mode == 0 {
        (None, None)
    } else {
        return Err(RegistrationError::Parse { kind: "stos", reason: format!("unknown mode: {mode}") });
    };

    let downsample: u32 = lines
        .next()
        .ok_or(RegistrationError::Parse { kind: "stos", reason: "missing downsample".into() })?
        .trim()
        .parse()
        .map_err(|_| RegistrationError::Parse { kind: "stos", reason: "bad downsample".into() })?;

    let target_size = parse_dims(lines.next().ok_or(RegistrationError::Parse { kind: "stos", reason: "missing target dims".into() })?)?;
    let source_size = parse_dims(lines.next().ok_or(RegistrationError::Parse { kind: "stos", reason: "missing source dims".into() })?)?;

    let transform_line = lines.next().ok_or(RegistrationError::Parse { kind: "stos", reason: "missing transform line".into() })?;
    let transform = parse_transform_line(transform_line)?;

    Ok(StosPair {
        source_image_path,
        target_image_path,
        target_mask_path,
        source_mask_path,
        downsample,
        target_size,
        source_size,
        transform,
    })
}

fn parse_dims(line: &str) -> Result<(u32, u32)> {
    let mut parts = line.split_whitespace();
    let w = expect_token(&mut parts, "width")?.parse().map_err(|_| RegistrationError::Parse { kind: "stos", reason: "bad width".into() })?;
    let h = expect_token(&mut parts, "height")?.parse().map_err(|_| RegistrationError::Parse { kind: "stos", reason: "bad height".into() })?;
    Ok((w, h))
}

/// A mosaic: every tile's image name mapped to its transform, in file order.
#[derive(Debug, Clone, Default)]
pub struct Mosaic {
    pub tiles: IndexMap<String, AnyTransform>,
}

/// Serialize a [`Mosaic`] to its `image_name -> transform_text_line` text
/// body (spec §4.H "Mosaic file").
pub fn write_mosaic(mosaic: &Mosaic) -> String {
    mosaic
        .tiles
        .iter()
        .map(|(name, transform)| format!("{name}: {}", write_transform_line(transform)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a mosaic file body into a [`Mosaic`].
pub fn parse_mosaic(text: &str) -> Result<Mosaic> {
    let mut tiles = IndexMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (name, rest) = line.split_once(':').ok_or(RegistrationError::Parse { kind: "mosaic", reason: format!("missing ':' separator in {line:?}") })?;
        let transform = parse_transform_line(rest.trim())?;
        tiles.insert(name.trim().to_string(), transform);
    }
    Ok(Mosaic { tiles })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rectangle;

    #[test]
    fn rigid_transform_line_round_trips() {
        let bbox = Rectangle::new(0.0, 0.0, 100.0, 100.0);
        let transform = RigidTransform::new(0.2, (5.5, -3.25), (50.0, 50.0), bbox);
        let line = write_rigid(&transform);
        let parsed = parse_transform_line(&line).unwrap();

        let probe = vec![(10.0, 20.0), (80.0, 5.0)];
        let expected = transform.transform(&probe);
        let got = parsed.transform(&probe);
        for (a, b) in expected.iter().zip(got.iter()) {
            assert!((a.0 - b.0).abs() < 1e-3);
            assert!((a.1 - b.1).abs() < 1e-3);
        }
    }

    #[test]
    fn similarity_transform_line_round_trips() {
        let bbox = Rectangle::new(0.0, 0.0, 100.0, 100.0);
        let transform = SimilarityTransform::new(0.5, 1.25, (2.0, 4.0), (50.0, 50.0), bbox);
        let line = write_similarity(&transform);
        let parsed = parse_transform_line(&line).unwrap();

        let probe = vec![(10.0, 20.0), (80.0, 5.0)];
        let expected = transform.transform(&probe);
        let got = parsed.transform(&probe);
        for (a, b) in expected.iter().zip(got.iter()) {
            assert!((a.0 - b.0).abs() < 1e-2);
            assert!((a.1 - b.1).abs() < 1e-2);
        }
    }

    #[test]
    fn mesh_transform_line_round_trips_at_control_points() {
        let fixed = vec![(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (10.0, 10.0)];
        let warped = fixed.clone();
        let cp = ControlPoints::from_pairs(fixed.clone(), warped.clone()).unwrap();
        let mesh = MeshTransform::new(cp).unwrap();

        let line = write_mesh(&mesh);
        let parsed = parse_transform_line(&line).unwrap();

        let got = parsed.transform(&warped);
        for (expected, actual) in fixed.iter().zip(got.iter()) {
            assert!((expected.0 - actual.0).abs() < 1e-6);
            assert!((expected.1 - actual.1).abs() < 1e-6);
        }
    }

    #[test]
    fn grid_transform_line_round_trips_at_anchors() {
        let warped = vec![(0.0, 0.0), (0.0, 10.0), (10.0, 0.0), (10.0, 10.0)];
        let fixed: Vec<_> = warped.iter().map(|&(y, x)| (y + 1.0, x + 2.0)).collect();
        let grid = GridTransform::new(2, 2, warped.clone(), fixed.clone()).unwrap();

        let line = write_grid(&grid);
        let parsed = parse_transform_line(&line).unwrap();

        let got = parsed.transform(&warped);
        for (expected, actual) in fixed.iter().zip(got.iter()) {
            assert!((expected.0 - actual.0).abs() < 1e-6);
            assert!((expected.1 - actual.1).abs() < 1e-6);
        }
    }

    /// A 3x2 lattice with unequal row/column spacing and a non-square warped
    /// bounding box: exercises the `fp[5]`/`fp[6]` width/height reconstruction
    /// rather than a case where unit spacing would hide a scaling bug.
    #[test]
    fn grid_transform_line_round_trips_with_non_unit_spacing() {
        let mut warped = Vec::new();
        for r in 0..3 {
            for c in 0..2 {
                warped.push((r as f64 * 7.0, c as f64 * 40.0));
            }
        }
        let fixed: Vec<_> = warped.iter().map(|&(y, x)| (y * 1.5 + 3.0, x * 0.5 - 1.0)).collect();
        let grid = GridTransform::new(3, 2, warped.clone(), fixed.clone()).unwrap();

        let line = write_grid(&grid);
        let parsed = parse_transform_line(&line).unwrap();

        let got = parsed.transform(&warped);
        for (expected, actual) in fixed.iter().zip(got.iter()) {
            assert!((expected.0 - actual.0).abs() < 1e-6, "expected {expected:?}, got {actual:?}");
            assert!((expected.1 - actual.1).abs() < 1e-6, "expected {expected:?}, got {actual:?}");
        }
    }

    /// Fixed (target) and warped (source) spaces are distinct and
    /// non-square, so a swapped-axis or unnormalised mx/my would fail this
    /// within `1e-6` even though the looser `1e-2`-scale tests above would
    /// not catch it.
    #[test]
    fn mesh_transform_line_round_trips_with_distinct_fixed_and_warped_spaces() {
        let warped = vec![(0.0, 0.0), (0.0, 40.0), (20.0, 0.0), (20.0, 40.0), (10.0, 15.0)];
        let fixed: Vec<_> = warped.iter().map(|&(y, x)| (y * 2.0 + 5.0, x * 0.25 - 3.0)).collect();
        let cp = ControlPoints::from_pairs(fixed.clone(), warped.clone()).unwrap();
        let mesh = MeshTransform::new(cp).unwrap();

        let line = write_mesh(&mesh);
        let parsed = parse_transform_line(&line).unwrap();

        let got = parsed.transform(&warped);
        for (expected, actual) in fixed.iter().zip(got.iter()) {
            assert!((expected.0 - actual.0).abs() < 1e-6, "expected {expected:?}, got {actual:?}");
            assert!((expected.1 - actual.1).abs() < 1e-6, "expected {expected:?}, got {actual:?}");
        }
    }

    #[test]
    fn sentinel_value_is_rejected() {
        let line = "Rigid2DTransform_double_2_2 vp 3 0.0 0.0 1.79e309 fp 2 0.0 0.0";
        assert!(matches!(parse_transform_line(line), Err(RegistrationError::Parse { .. }) | Err(RegistrationError::InvalidTransformLiteral(_))));

        let huge = "Rigid2DTransform_double_2_2 vp 3 0.0 0.0 2e308 fp 2 0.0 0.0";
        assert!(matches!(parse_transform_line(huge), Err(RegistrationError::InvalidTransformLiteral(_))));
    }

    #[test]
    fn stos_header_round_trips_without_masks() {
        let bbox = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let pair = StosPair {
            source_image_path: "source.png".into(),
            target_image_path: "target.png".into(),
            target_mask_path: None,
            source_mask_path: None,
            downsample: 1,
            target_size: (512, 512),
            source_size: (512, 512),
            transform: AnyTransform::Rigid(RigidTransform::identity(bbox)),
        };

        let text = write_stos(&pair);
        let parsed = parse_stos(&text).unwrap();
        assert_eq!(parsed.source_image_path, "source.png");
        assert_eq!(parsed.target_image_path, "target.png");
        assert!(parsed.target_mask_path.is_none());
        assert_eq!(parsed.downsample, 1);
        assert_eq!(parsed.target_size, (512, 512));
    }

    #[test]
    fn stos_header_round_trips_with_masks() {
        let bbox = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let pair = StosPair {
            source_image_path: "source.png".into(),
            target_image_path: "target.png".into(),
            target_mask_path: Some("target_mask.png".into()),
            source_mask_path: Some("source_mask.png".into()),
            downsample: 2,
            target_size: (256, 256),
            source_size: (256, 256),
            transform: AnyTransform::Rigid(RigidTransform::identity(bbox)),
        };

        let text = write_stos(&pair);
        let parsed = parse_stos(&text).unwrap();
        assert_eq!(parsed.target_mask_path.as_deref(), Some("target_mask.png"));
        assert_eq!(parsed.source_mask_path.as_deref(), Some("source_mask.png"));
    }

    #[test]
    fn mosaic_round_trips_multiple_tiles() {
        let bbox = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let mut mosaic = Mosaic::default();
        mosaic.tiles.insert("tile_001.png".to_string(), AnyTransform::Rigid(RigidTransform::identity(bbox)));
        mosaic.tiles.insert(
            "tile_002.png".to_string(),
            AnyTransform::Rigid(RigidTransform::new(0.1, (5.0, 5.0), (5.0, 5.0), bbox)),
        );

        let text = write_mosaic(&mosaic);
        let parsed = parse_mosaic(&text).unwrap();
        assert_eq!(parsed.tiles.len(), 2);
        assert!(parsed.tiles.contains_key("tile_001.png"));
        assert!(parsed.tiles.contains_key("tile_002.png"));
    }
}
