use std::collections::HashMap;

use log::{debug, info, warn};
use nalgebra as na;
use serde::{Deserialize, Serialize};
use tiny_solver::LevenbergMarquardtOptimizer;
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;

use crate::board::ObjectPointSet;
use crate::camera_model::{DistortionModel, PinholeCamera};
use crate::detected_points::{ImagePointSet, ViewCorrespondence, build_correspondences};
use crate::error::{CalibError, Result};
use crate::optimization::factors::ReprojectionFactor;
use crate::optimization::{find_homography, init_intrinsics, init_pose};
use crate::types::{RvecTvec, rvec_to_matrix};

const INTRINSICS: &str = "intrinsics";
const DISTORTION: &str = "distortion";

fn rvec_name(i: usize) -> String {
    format!("rvec{}", i)
}
fn tvec_name(i: usize) -> String {
    format!("tvec{}", i)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationFlags {
    /// Keep cx, cy at their initial values: `initial_k` when given,
    /// otherwise the image centre `((w - 1) / 2, (h - 1) / 2)`.
    pub fix_principal_point: bool,
    /// Force p1 = p2 = 0.
    pub zero_tangent_dist: bool,
    /// Keep k3 and every higher radial term at its initial value.
    pub fix_k3: bool,
    /// Start from `initial_k` instead of the closed form estimate.
    pub use_intrinsic_guess: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    pub distortion_model: DistortionModel,
    pub flags: CalibrationFlags,
    pub max_iterations: usize,
    /// Relative cost decrease below which the optimizer stops.
    pub tolerance: f64,
    /// rms in pixels above which the result is reported as ill-conditioned.
    pub rms_warn_threshold: f64,
    pub initial_k: Option<[[f64; 3]; 3]>,
    pub initial_dist: Option<Vec<f64>>,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            distortion_model: DistortionModel::default(),
            flags: CalibrationFlags::default(),
            max_iterations: 100,
            tolerance: 1e-10,
            rms_warn_threshold: 2.0,
            initial_k: None,
            initial_dist: None,
        }
    }
}

impl CalibrationOptions {
    fn initial_k_matrix(&self) -> Option<na::Matrix3<f64>> {
        match self.initial_k {
            Some(k) => Some(na::Matrix3::from_fn(|r, c| k[r][c])),
            None => {
                if self.flags.use_intrinsic_guess {
                    warn!("use_intrinsic_guess is set without initial_k, ignoring");
                }
                None
            }
        }
    }

    fn initial_dist_vec(&self) -> Result<na::DVector<f64>> {
        let count = self.distortion_model.coeff_count();
        let mut dist = na::DVector::zeros(count);
        if let Some(d) = &self.initial_dist {
            if d.len() > count {
                return Err(CalibError::InvalidInput(format!(
                    "{} initial distortion coefficients given, {:?} takes at most {}",
                    d.len(),
                    self.distortion_model,
                    count
                )));
            }
            for (c, v) in dist.iter_mut().zip(d) {
                *c = *v;
            }
        }
        if self.flags.zero_tangent_dist {
            dist[2] = 0.0;
            dist[3] = 0.0;
        }
        Ok(dist)
    }
}

/// Shared intrinsics plus one pose per view that entered the optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationResult {
    pub k: na::Matrix3<f64>,
    pub dist_coeffs: Vec<f64>,
    pub distortion_model: DistortionModel,
    pub rvecs: Vec<na::Vector3<f64>>,
    pub tvecs: Vec<na::Vector3<f64>>,
    pub rms: f64,
    pub image_size: Option<(u32, u32)>,
    /// Position of each pose in the caller's view list.
    pub view_indices: Vec<usize>,
}

impl CalibrationResult {
    pub fn camera(&self) -> PinholeCamera<f64> {
        PinholeCamera::from_k(&self.k, &self.dist_coeffs, self.distortion_model)
    }

    pub fn poses(&self) -> Vec<RvecTvec> {
        self.rvecs
            .iter()
            .zip(&self.tvecs)
            .map(|(r, t)| RvecTvec::new(r, t))
            .collect()
    }

    pub fn view_count(&self) -> usize {
        self.rvecs.len()
    }
}

/// Calibrates from one shared object point set and per-view detections.
///
/// `rvecs`/`tvecs` of the result follow the order of `image_point_sets`;
/// views rejected as degenerate are skipped and `view_indices` records the
/// survivors.
pub fn calibrate(
    object_points: &ObjectPointSet,
    image_point_sets: &[ImagePointSet],
    image_size: (u32, u32),
    options: &CalibrationOptions,
) -> Result<CalibrationResult> {
    let views = build_correspondences(object_points, image_point_sets.to_vec())?;
    calibrate_views(&views, image_size, options)
}

/// Calibrates from prepared correspondences, see [`calibrate`].
///
/// The same input gives the same result up to floating point rounding:
/// tiny-solver orders its variables through a `HashMap`, so the summation
/// order of the normal equations can differ between runs.
pub fn calibrate_views(
    views: &[ViewCorrespondence],
    image_size: (u32, u32),
    options: &CalibrationOptions,
) -> Result<CalibrationResult> {
    if views.is_empty() {
        return Err(CalibError::InsufficientData(
            "no views to calibrate from".to_string(),
        ));
    }
    if image_size.0 == 0 || image_size.1 == 0 {
        return Err(CalibError::InvalidInput(format!(
            "image size {}x{} is empty",
            image_size.0, image_size.1
        )));
    }
    let model = options.distortion_model;
    let initial_k = options.initial_k_matrix();
    let initial_dist = options.initial_dist_vec()?;

    // homographies are fitted on ideal pixels when a distortion guess exists
    let undistorter = initial_k
        .filter(|_| initial_dist.iter().any(|d| *d != 0.0))
        .map(|k| PinholeCamera::from_k(&k, initial_dist.as_slice(), model));

    let mut homographies = Vec::with_capacity(views.len());
    let mut kept = Vec::with_capacity(views.len());
    for (i, view) in views.iter().enumerate() {
        let plane: Vec<_> = view
            .object_points
            .iter()
            .map(|p| na::Point2::new(p.x, p.y))
            .collect();
        let pixels: Vec<_> = match &undistorter {
            Some(cam) => view
                .image_points
                .points()
                .iter()
                .map(|p| cam.undistort_point(p))
                .collect(),
            None => view.image_points.points().to_vec(),
        };
        match find_homography(&plane, &pixels) {
            Ok(h) => {
                homographies.push(h);
                kept.push(i);
            }
            Err(e) => warn!("dropping view {}: {}", i, e),
        }
    }
    if kept.is_empty() {
        return Err(CalibError::DegenerateGeometry(
            "every view was rejected before optimization".to_string(),
        ));
    }

    let k0 = match initial_k {
        Some(k) => k,
        None => {
            let mut k = init_intrinsics(&homographies, image_size);
            if options.flags.fix_principal_point {
                k[(0, 2)] = (image_size.0 as f64 - 1.0) / 2.0;
                k[(1, 2)] = (image_size.1 as f64 - 1.0) / 2.0;
            }
            k
        }
    };
    info!("initial K:{}", k0);

    let mut poses = Vec::with_capacity(kept.len());
    let mut view_indices = Vec::with_capacity(kept.len());
    for (h, &i) in homographies.iter().zip(&kept) {
        match init_pose(&k0, h) {
            Ok(rt) => {
                poses.push(rt);
                view_indices.push(i);
            }
            Err(e) => warn!("dropping view {}: {}", i, e),
        }
    }
    if view_indices.is_empty() {
        return Err(CalibError::DegenerateGeometry(
            "no view yields an initial pose".to_string(),
        ));
    }
    if view_indices.len() < 3 {
        warn!(
            "only {} usable views, intrinsics may be poorly constrained",
            view_indices.len()
        );
    }

    let mut problem = Problem::new();
    let mut initial_values = HashMap::<String, na::DVector<f64>>::new();
    initial_values.insert(
        INTRINSICS.to_string(),
        na::dvector![k0[(0, 0)], k0[(1, 1)], k0[(0, 2)], k0[(1, 2)]],
    );
    initial_values.insert(DISTORTION.to_string(), initial_dist.clone());

    for (slot, (&view_idx, pose)) in view_indices.iter().zip(&poses).enumerate() {
        let rname = rvec_name(slot);
        let tname = tvec_name(slot);
        initial_values.insert(rname.clone(), na::DVector::from_column_slice(pose.rvec.as_slice()));
        initial_values.insert(tname.clone(), na::DVector::from_column_slice(pose.tvec.as_slice()));
        for (p3d, p2d) in views[view_idx].pairs() {
            let cost = ReprojectionFactor::new(p3d, p2d, model);
            problem.add_residual_block(
                2,
                &[INTRINSICS, DISTORTION, rname.as_str(), tname.as_str()],
                Box::new(cost),
                None,
            );
        }
    }

    let flags = options.flags;
    if flags.fix_principal_point {
        problem.fix_variable(INTRINSICS, 2);
        problem.fix_variable(INTRINSICS, 3);
    }
    if flags.zero_tangent_dist {
        problem.fix_variable(DISTORTION, 2);
        problem.fix_variable(DISTORTION, 3);
    }
    if flags.fix_k3 {
        for idx in 4..model.coeff_count() {
            problem.fix_variable(DISTORTION, idx);
        }
    }

    let optimizer = LevenbergMarquardtOptimizer::default();
    let mut solver_options = OptimizerOptions::default();
    solver_options.max_iteration = options.max_iterations;
    solver_options.min_rel_error_decrease_threshold = options.tolerance;
    solver_options.min_abs_error_decrease_threshold = options.tolerance;
    solver_options.min_error_threshold = options.tolerance * options.tolerance;
    debug!(
        "optimizing {} views, {} residual blocks",
        view_indices.len(),
        view_indices
            .iter()
            .map(|&i| views[i].image_points.len())
            .sum::<usize>()
    );
    let values = match optimizer.optimize(&problem, &initial_values, Some(solver_options)) {
        Some(v) => v,
        None => {
            warn!("optimizer returned no solution, keeping the initial estimate");
            initial_values
        }
    };

    let fetch = |name: &str| {
        values
            .get(name)
            .cloned()
            .ok_or_else(|| CalibError::InvalidInput(format!("solver lost variable {}", name)))
    };
    let intr = fetch(INTRINSICS)?;
    let dist = fetch(DISTORTION)?;
    let k = na::Matrix3::new(
        intr[0], 0.0, intr[2], //
        0.0, intr[1], intr[3], //
        0.0, 0.0, 1.0,
    );
    let mut rvecs = Vec::with_capacity(view_indices.len());
    let mut tvecs = Vec::with_capacity(view_indices.len());
    for slot in 0..view_indices.len() {
        let r = fetch(&rvec_name(slot))?;
        let t = fetch(&tvec_name(slot))?;
        rvecs.push(na::Vector3::new(r[0], r[1], r[2]));
        tvecs.push(na::Vector3::new(t[0], t[1], t[2]));
    }

    let mut result = CalibrationResult {
        k,
        dist_coeffs: dist.iter().copied().collect(),
        distortion_model: model,
        rvecs,
        tvecs,
        rms: 0.0,
        image_size: Some(image_size),
        view_indices,
    };
    let used: Vec<_> = result
        .view_indices
        .iter()
        .map(|&i| views[i].clone())
        .collect();
    result.rms = rms_error(&result, &used);
    info!("calibrated K:{}", result.k);
    info!("distortion: {:?}", result.dist_coeffs);
    info!("rms: {:.6} px over {} views", result.rms, result.view_count());
    if !result.rms.is_finite() || result.rms > options.rms_warn_threshold {
        warn!(
            "rms {:.3} px exceeds {:.3} px, the calibration is ill-conditioned",
            result.rms, options.rms_warn_threshold
        );
    }
    Ok(result)
}

/// Per-point reprojection error norms for each view, co-indexed with `views`.
pub fn reprojection_errors(result: &CalibrationResult, views: &[ViewCorrespondence]) -> Vec<Vec<f64>> {
    let camera = result.camera();
    views
        .iter()
        .zip(result.rvecs.iter().zip(&result.tvecs))
        .map(|(view, (rvec, tvec))| {
            let rotation = rvec_to_matrix(rvec);
            view.pairs()
                .map(|(p3d, p2d)| (camera.project_world(&rotation, tvec, p3d) - p2d).norm())
                .collect()
        })
        .collect()
}

/// Root mean square of every residual over `views`, co-indexed with the poses.
pub fn rms_error(result: &CalibrationResult, views: &[ViewCorrespondence]) -> f64 {
    let (sum_sq, count) = reprojection_errors(result, views)
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), e| (s + e * e, n + 1));
    if count == 0 {
        return 0.0;
    }
    (sum_sq / count as f64).sqrt()
}
