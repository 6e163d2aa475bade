//! Synthetic chessboard views for tests, benchmarks and the `generate` command.

use std::path::Path;

use image::{GrayImage, Luma};
use log::info;
use nalgebra as na;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::board::{ObjectPointSet, TargetGeometry};
use crate::calibration::CalibrationResult;
use crate::camera_model::PinholeCamera;
use crate::error::{CalibError, Result};
use crate::types::RvecTvec;

const BLACK: f64 = 25.0;
const WHITE: f64 = 225.0;
const BACKGROUND: f64 = 120.0;

/// Intensity of the printed target at plane coordinates `(x, y)`.
///
/// Squares cover `[-s, columns*s] x [-s, rows*s]` so that the inner corners
/// sit at `(c*s, r*s)`; one more cell of white paper surrounds them.
fn board_intensity(target: &TargetGeometry, x: f64, y: f64) -> f64 {
    let s = target.cell_size();
    let cols = target.columns() as f64;
    let rows = target.rows() as f64;
    let in_squares = x >= -s && x < cols * s && y >= -s && y < rows * s;
    if in_squares {
        let parity = ((x / s).floor() + (y / s).floor()) as i64;
        if parity.rem_euclid(2) == 0 { BLACK } else { WHITE }
    } else if x >= -2.0 * s && x < (cols + 1.0) * s && y >= -2.0 * s && y < (rows + 1.0) * s {
        WHITE
    } else {
        BACKGROUND
    }
}

/// Ray-traces the target through `camera` at `pose`.
///
/// Each pixel averages `supersample * supersample` rays.
pub fn render_board(
    camera: &PinholeCamera<f64>,
    pose: &RvecTvec,
    target: &TargetGeometry,
    image_size: (u32, u32),
    supersample: u32,
) -> GrayImage {
    let ss = supersample.max(1);
    let rt = pose.rotation_matrix().transpose();
    let center = -rt * pose.tvec;
    let distorted = camera.dist.iter().any(|d| *d != 0.0);

    let mut img = GrayImage::new(image_size.0, image_size.1);
    for (px, py, pixel) in img.enumerate_pixels_mut() {
        let mut acc = 0.0;
        for sy in 0..ss {
            for sx in 0..ss {
                let u = px as f64 - 0.5 + (sx as f64 + 0.5) / ss as f64;
                let v = py as f64 - 0.5 + (sy as f64 + 0.5) / ss as f64;
                let ideal = if distorted {
                    camera.undistort_point(&na::Point2::new(u, v))
                } else {
                    na::Point2::new(u, v)
                };
                let ray = na::Vector3::new(
                    (ideal.x - camera.cx) / camera.fx,
                    (ideal.y - camera.cy) / camera.fy,
                    1.0,
                );
                let dir = rt * ray;
                acc += if dir.z.abs() < 1e-12 {
                    BACKGROUND
                } else {
                    let lambda = -center.z / dir.z;
                    if lambda <= 0.0 {
                        BACKGROUND
                    } else {
                        let p = center + dir * lambda;
                        board_intensity(target, p.x, p.y)
                    }
                };
            }
        }
        let value = acc / (ss * ss) as f64;
        *pixel = Luma([value.round().clamp(0.0, 255.0) as u8]);
    }
    img
}

/// Seeded poses that keep the whole target in front of the camera, tilted by
/// at most `max_tilt` radians per axis, about `distance` away.
pub fn random_poses(
    target: &TargetGeometry,
    count: usize,
    distance: f64,
    max_tilt: f64,
    seed: u64,
) -> Vec<RvecTvec> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let board_center = na::Vector3::new(
        (target.columns() - 1) as f64 * target.cell_size() / 2.0,
        (target.rows() - 1) as f64 * target.cell_size() / 2.0,
        0.0,
    );
    (0..count)
        .map(|_| {
            let rvec = na::Vector3::new(
                rng.random_range(-max_tilt..=max_tilt),
                rng.random_range(-max_tilt..=max_tilt),
                rng.random_range(-max_tilt..=max_tilt),
            );
            let rotation = na::Rotation3::new(rvec);
            let offset = na::Vector3::new(
                rng.random_range(-0.05..=0.05) * distance,
                rng.random_range(-0.05..=0.05) * distance,
                distance * rng.random_range(0.9..=1.1),
            );
            let tvec = offset - rotation * board_center;
            RvecTvec::new(&rvec, &tvec)
        })
        .collect()
}

pub fn project_points(
    camera: &PinholeCamera<f64>,
    pose: &RvecTvec,
    object_points: &ObjectPointSet,
) -> Vec<na::Point2<f64>> {
    let rotation = pose.rotation_matrix();
    object_points
        .iter()
        .map(|p| camera.project_world(&rotation, &pose.tvec, p))
        .collect()
}

/// Adds uniform noise in `[-amplitude, amplitude]` to every coordinate.
pub fn perturb_points(points: &mut [na::Point2<f64>], amplitude: f64, seed: u64) {
    if amplitude <= 0.0 {
        return;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for p in points.iter_mut() {
        p.x += rng.random_range(-amplitude..=amplitude);
        p.y += rng.random_range(-amplitude..=amplitude);
    }
}

/// Renders `poses` into `output_dir` as `frame_XXXX.png` and stores the
/// ground truth next to them as `ground_truth.json`.
pub fn write_dataset(
    output_dir: &Path,
    camera: &PinholeCamera<f64>,
    target: &TargetGeometry,
    poses: &[RvecTvec],
    image_size: (u32, u32),
) -> Result<()> {
    std::fs::create_dir_all(output_dir).map_err(|e| CalibError::io(output_dir, e))?;
    for (i, pose) in poses.iter().enumerate() {
        let img = render_board(camera, pose, target, image_size, 3);
        let path = output_dir.join(format!("frame_{:04}.png", i));
        img.save(&path)?;
        info!("wrote {}", path.display());
    }
    let truth = CalibrationResult {
        k: camera.k_matrix(),
        dist_coeffs: camera.dist.iter().copied().collect(),
        distortion_model: camera.model,
        rvecs: poses.iter().map(|p| p.rvec).collect(),
        tvecs: poses.iter().map(|p| p.tvec).collect(),
        rms: 0.0,
        image_size: Some(image_size),
        view_indices: (0..poses.len()).collect(),
    };
    crate::io::save_calibration(output_dir.join("ground_truth.json"), &truth)
}
