//! Grid refinement engine (spec §4.E), grounded on `RefineTransform`/
//! `_RunRefinement` in `nornir_imageregistration/grid_refinement.py`.
//!
//! Starting from a coarse transform (typically [`crate::align::slice_to_slice`]'s
//! rigid estimate), lays a regular lattice of cells over the fixed image,
//! locally phase-correlates each cell against the corresponding warped-space
//! tile, and refits a [`MeshTransform`] from the corrected correspondences.
//! Cells whose correlation weight clears a percentile cutoff that tightens
//! each iteration are "finalised": frozen in place for the remaining
//! iterations so a transform that has already converged there isn't
//! perturbed by noisier neighbouring cells.

use crate::error::{RegistrationError, Result};
use crate::phasecorr::find_offset;
use crate::raster::padding::crop;
use crate::raster::padding::FillValue;
use crate::raster::Raster;
use crate::transform::control_points::ControlPoints;
use crate::transform::mesh::MeshTransform;
use crate::transform::Transform;
use crate::workers::Workers;

/// One lattice cell's alignment state across refinement iterations.
#[derive(Debug, Clone, Copy)]
pub struct EnhancedAlignmentRecord {
    pub fixed_point: (f64, f64),
    pub warped_point: (f64, f64),
    pub weight: f32,
    pub finalized: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RefinementOptions {
    pub cell_size: (usize, usize),
    pub max_iterations: usize,
    pub min_overlap: f64,
    pub cutoff: f64,
    /// Starting percentile (0-1) of cells kept each iteration; it increases
    /// toward 1.0 as iterations proceed so early, noisy passes are lenient
    /// and later passes only keep the strongest matches.
    pub starting_percentile: f64,
    /// A cell's weight must clear this absolute threshold to be finalised
    /// (frozen) rather than re-evaluated on the next iteration.
    pub finalize_weight: f32,
    /// Minimum surviving cells required to refit a mesh.
    pub min_surviving_cells: usize,
}

impl Default for RefinementOptions {
    fn default() -> Self {
        Self {
            cell_size: (64, 64),
            max_iterations: 10,
            min_overlap: 0.5,
            cutoff: 0.995,
            starting_percentile: 0.5,
            finalize_weight: 0.75,
            min_surviving_cells: 4,
        }
    }
}

fn lattice_centers(height: usize, width: usize, cell: (usize, usize)) -> Vec<(f64, f64)> {
    let (cell_h, cell_w) = cell;
    let rows = height.div_ceil(cell_h).max(2);
    let cols = width.div_ceil(cell_w).max(2);
    let mut centers = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let y = (r as f64 + 0.5) * (height as f64 / rows as f64);
            let x = (c as f64 + 0.5) * (width as f64 / cols as f64);
            centers.push((y, x));
        }
    }
    centers
}

fn percentile(values: &[f32], fraction: f64) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = ((sorted.len() as f64 - 1.0) * fraction.clamp(0.0, 1.0)).round() as usize;
    sorted[idx]
}

/// Locally phase-correlate a single cell centred at `fixed_center`, whose
/// current estimated warped-space position is `warped_center`.
fn refine_cell(
    fixed_raster: &Raster,
    warped_raster: &Raster,
    fixed_center: (f64, f64),
    warped_center: (f64, f64),
    cell: (usize, usize),
    min_overlap: f64,
    cutoff: f64,
) -> Result<EnhancedAlignmentRecord> {
    let (cell_h, cell_w) = cell;
    let origin_fixed = (fixed_center.0 - cell_h as f64 / 2.0, fixed_center.1 - cell_w as f64 / 2.0);
    let origin_warped = (warped_center.0 - cell_h as f64 / 2.0, warped_center.1 - cell_w as f64 / 2.0);

    let fixed_tile = crop(
        fixed_raster,
        (origin_fixed.0.round() as i64, origin_fixed.1.round() as i64),
        (cell_h, cell_w),
        FillValue::Random,
    )?;
    let warped_tile = crop(
        warped_raster,
        (origin_warped.0.round() as i64, origin_warped.1.round() as i64),
        (cell_h, cell_w),
        FillValue::Random,
    )?;

    let (dy, dx, weight) = find_offset(&fixed_tile, &warped_tile, None, cutoff)?;
    let _ = min_overlap;

    Ok(EnhancedAlignmentRecord {
        fixed_point: fixed_center,
        warped_point: (warped_center.0 + dy, warped_center.1 + dx),
        weight,
        finalized: false,
    })
}

/// Run the full refinement loop, returning the refined [`MeshTransform`]
/// along with the final per-cell records (useful for diagnostics/tests).
pub fn refine_grid(
    fixed_raster: &Raster,
    warped_raster: &Raster,
    initial_transform: &impl Transform,
    options: RefinementOptions,
    workers: &Workers,
) -> Result<(MeshTransform, Vec<EnhancedAlignmentRecord>)> {
    let centers = lattice_centers(fixed_raster.height(), fixed_raster.width(), options.cell_size);
    let warped_estimates = initial_transform.inverse_transform(&centers)?;

    let mut records: Vec<EnhancedAlignmentRecord> = centers
        .iter()
        .zip(warped_estimates)
        .map(|(&fixed_point, warped_point)| EnhancedAlignmentRecord { fixed_point, warped_point, weight: 0.0, finalized: false })
        .collect();

    for iteration in 0..options.max_iterations {
        let progress = iteration as f64 / options.max_iterations.max(1) as f64;
        let live_percentile = options.starting_percentile + (1.0 - options.starting_percentile) * progress;

        let to_refine: Vec<(usize, EnhancedAlignmentRecord)> =
            records.iter().enumerate().filter(|(_, r)| !r.finalized).map(|(i, &r)| (i, r)).collect();

        let refined: Vec<Result<EnhancedAlignmentRecord>> = workers.map(to_refine, {
            let cell = options.cell_size;
            let min_overlap = options.min_overlap;
            let cutoff = options.cutoff;
            move |(_, record)| {
                refine_cell(fixed_raster, warped_raster, record.fixed_point, record.warped_point, cell, min_overlap, cutoff)
            }
        });

        let mut weights = Vec::new();
        let mut updated = Vec::new();
        for r in refined {
            if let Ok(rec) = r {
                weights.push(rec.weight);
                updated.push(rec);
            }
        }

        let threshold = percentile(&weights, 1.0 - live_percentile);
        for rec in updated {
            let idx = records
                .iter()
                .position(|r| !r.finalized && r.fixed_point == rec.fixed_point)
                .unwrap_or(usize::MAX);
            if idx == usize::MAX {
                continue;
            }
            if rec.weight >= threshold {
                let finalized = rec.weight >= options.finalize_weight;
                records[idx] = EnhancedAlignmentRecord { finalized, ..rec };
            }
        }

        // Refit a mesh through every surviving pair and use it to refresh
        // the warped-space estimate of every still-open cell, so the next
        // iteration's phase correlation runs against the current best fit
        // rather than the initial coarse transform (spec §4.E step 5).
        // Finalised cells are left untouched, that's what finalisation means.
        let fit_fixed: Vec<(f64, f64)> = records.iter().filter(|r| r.weight > 0.0).map(|r| r.fixed_point).collect();
        let fit_warped: Vec<(f64, f64)> = records.iter().filter(|r| r.weight > 0.0).map(|r| r.warped_point).collect();
        if fit_fixed.len() >= 3 {
            if let Ok(cp) = ControlPoints::from_pairs(fit_fixed, fit_warped) {
                if let Ok(fit) = MeshTransform::new(cp) {
                    let open_fixed: Vec<(f64, f64)> = records.iter().filter(|r| !r.finalized).map(|r| r.fixed_point).collect();
                    if let Ok(new_estimates) = fit.inverse_transform(&open_fixed) {
                        let mut estimates = new_estimates.into_iter();
                        for rec in records.iter_mut().filter(|r| !r.finalized) {
                            if let Some(estimate) = estimates.next() {
                                rec.warped_point = estimate;
                            }
                        }
                    }
                }
            }
        }
    }

    let survivors: Vec<&EnhancedAlignmentRecord> = records.iter().filter(|r| r.weight > 0.0).collect();
    if survivors.len() < options.min_surviving_cells {
        return Err(RegistrationError::InsufficientEvidence {
            surviving: survivors.len(),
            required: options.min_surviving_cells,
        });
    }

    let fixed: Vec<(f64, f64)> = survivors.iter().map(|r| r.fixed_point).collect();
    let warped: Vec<(f64, f64)> = survivors.iter().map(|r| r.warped_point).collect();
    let control_points = ControlPoints::from_pairs(fixed, warped)?;
    let mesh = MeshTransform::new(control_points)?;

    Ok((mesh, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rectangle;
    use crate::raster::DType;
    use crate::transform::rigid::RigidTransform;
    use ndarray::Array2;

    fn checkerboard(h: usize, w: usize) -> Raster {
        Raster::new(
            Array2::from_shape_fn((h, w), |(y, x)| if (y / 8 + x / 8) % 2 == 0 { 1.0 } else { 0.0 }),
            DType::F32,
        )
    }

    #[test]
    fn refining_an_identity_transform_stays_converged() {
        let image = checkerboard(128, 128);
        let bbox = Rectangle::new(0.0, 0.0, 128.0, 128.0);
        let identity = RigidTransform::identity(bbox);
        let workers = Workers::new(2);
        let options = RefinementOptions { max_iterations: 2, cell_size: (32, 32), ..Default::default() };

        let result = refine_grid(&image, &image, &identity, options, &workers);
        assert!(result.is_ok());
    }

    #[test]
    fn too_few_lattice_cells_is_insufficient_evidence() {
        let image = checkerboard(16, 16);
        let bbox = Rectangle::new(0.0, 0.0, 16.0, 16.0);
        let identity = RigidTransform::identity(bbox);
        let workers = Workers::new(1);
        let options = RefinementOptions {
            max_iterations: 1,
            cell_size: (64, 64),
            min_surviving_cells: 1000,
            ..Default::default()
        };
        let result = refine_grid(&image, &image, &identity, options, &workers);
        assert!(result.is_err());
    }
}
