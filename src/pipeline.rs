use image::DynamicImage;
use indicatif::ParallelProgressIterator;
use log::{debug, info};
use rayon::prelude::*;

use crate::board::{TargetGeometry, build_object_points};
use crate::calibration::{CalibrationOptions, CalibrationResult, calibrate_views};
use crate::detected_points::{ImagePointSet, ViewCorrespondence, build_correspondences};
use crate::detector::{DetectorOptions, detect_with_options};
use crate::error::{CalibError, Result};

/// Detects the target in every image on the rayon pool.
///
/// The output is co-indexed with `images`; `None` marks an image where the
/// pattern was not found.
pub fn detect_all(
    images: &[DynamicImage],
    target: &TargetGeometry,
    options: &DetectorOptions,
) -> Vec<Option<ImagePointSet>> {
    images
        .par_iter()
        .progress_count(images.len() as u64)
        .map(|img| detect_with_options(img, target, options))
        .collect()
}

/// Calibration together with the correspondences it was computed from.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub result: CalibrationResult,
    /// Input image index of each pose in `result`.
    pub image_indices: Vec<usize>,
    /// Correspondences of the calibrated views, co-indexed with the poses.
    pub views: Vec<ViewCorrespondence>,
    pub detections: Vec<Option<ImagePointSet>>,
}

/// Detection followed by calibration over all images of one camera.
///
/// Images where the pattern is not found are skipped. Fails with
/// `InsufficientData` when none is left.
pub fn run(
    images: &[DynamicImage],
    target: &TargetGeometry,
    detector_options: &DetectorOptions,
    calibration_options: &CalibrationOptions,
) -> Result<PipelineOutput> {
    let first = images
        .first()
        .ok_or_else(|| CalibError::InsufficientData("no images to calibrate from".to_string()))?;
    let image_size = (first.width(), first.height());
    if let Some((i, img)) = images
        .iter()
        .enumerate()
        .find(|(_, img)| (img.width(), img.height()) != image_size)
    {
        return Err(CalibError::InvalidInput(format!(
            "image {} is {}x{}, expected {}x{}",
            i,
            img.width(),
            img.height(),
            image_size.0,
            image_size.1
        )));
    }

    let detections = detect_all(images, target, detector_options);
    let mut detected_indices = Vec::new();
    let mut point_sets = Vec::new();
    for (i, d) in detections.iter().enumerate() {
        match d {
            Some(points) => {
                detected_indices.push(i);
                point_sets.push(points.clone());
            }
            None => info!("pattern not found in image {}, skipped", i),
        }
    }
    info!("pattern found in {}/{} images", point_sets.len(), images.len());
    if point_sets.is_empty() {
        return Err(CalibError::InsufficientData(
            "the pattern was not detected in any image".to_string(),
        ));
    }

    let object_points = build_object_points(target);
    let views = build_correspondences(&object_points, point_sets)?;
    let result = calibrate_views(&views, image_size, calibration_options)?;
    let image_indices: Vec<usize> = result
        .view_indices
        .iter()
        .map(|&v| detected_indices[v])
        .collect();
    debug!("calibrated image indices: {:?}", image_indices);
    let views = result.view_indices.iter().map(|&v| views[v].clone()).collect();
    Ok(PipelineOutput {
        result,
        image_indices,
        views,
        detections,
    })
}

/// Settings of a full run, loadable from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub target: Option<TargetGeometry>,
    pub detector: DetectorOptions,
    pub calibration: CalibrationOptions,
}
