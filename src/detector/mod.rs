//! Checkerboard inner-corner detection.
//!
//! ChESS corners and the chessboard grid come from `chess-corners` and
//! `calib-targets`. This module only insists on a full `columns x rows`
//! rectangle and hands the corners back in the target's row-major order.

mod grid;

use calib_targets::chessboard::ChessboardParams;
use calib_targets::detect::detect_chessboard;
use chess_corners::ChessConfig;
use image::DynamicImage;
use log::debug;
use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::board::TargetGeometry;
use crate::detected_points::ImagePointSet;

pub use grid::{CornerGrid, assemble_grid};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    /// Gaussian smoothing applied before corner detection, 0 disables it.
    pub blur_sigma: f32,
    /// Fraction of the strongest ChESS response a corner must reach.
    pub relative_threshold: f32,
    pub nms_radius: u32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            blur_sigma: 0.0,
            relative_threshold: 0.2,
            nms_radius: 2,
        }
    }
}

impl DetectorOptions {
    fn chess_config(&self) -> ChessConfig {
        let mut cfg = ChessConfig::single_scale();
        cfg.params.threshold_rel = self.relative_threshold;
        cfg.params.nms_radius = self.nms_radius;
        cfg
    }

    fn chessboard_params(&self, target: &TargetGeometry) -> ChessboardParams {
        ChessboardParams {
            expected_rows: Some(target.rows() as u32),
            expected_cols: Some(target.columns() as u32),
            completeness_threshold: 1.0,
            ..ChessboardParams::default()
        }
    }
}

/// Finds the `columns x rows` inner corners of `target`, or `None`.
pub fn detect(image: &DynamicImage, target: &TargetGeometry) -> Option<ImagePointSet> {
    detect_with_options(image, target, &DetectorOptions::default())
}

pub fn detect_with_options(
    image: &DynamicImage,
    target: &TargetGeometry,
    options: &DetectorOptions,
) -> Option<ImagePointSet> {
    let mut gray = image.to_luma8();
    if options.blur_sigma > 0.0 {
        gray = image::imageops::blur(&gray, options.blur_sigma);
    }
    let Some(result) = detect_chessboard(
        &gray,
        &options.chess_config(),
        options.chessboard_params(target),
    ) else {
        debug!("no chessboard in {}x{} image", gray.width(), gray.height());
        return None;
    };
    let labeled: Vec<_> = result
        .detection
        .corners
        .iter()
        .filter_map(|c| {
            let g = c.grid?;
            let p = na::Point2::new(c.position.x as f64, c.position.y as f64);
            Some(((g.i, g.j), p))
        })
        .collect();
    let grid = assemble_grid(&labeled, target)?;
    let points = grid.ordered_points(target)?;
    ImagePointSet::new(points, target).ok()
}
