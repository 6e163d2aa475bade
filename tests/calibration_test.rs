use nalgebra as na;
use planar_camera_calibration::board::{ObjectPointSet, TargetGeometry, build_object_points};
use planar_camera_calibration::calibration::{
    CalibrationFlags, CalibrationOptions, CalibrationResult, calibrate,
};
use planar_camera_calibration::camera_model::{DistortionModel, PinholeCamera};
use planar_camera_calibration::detected_points::ImagePointSet;
use planar_camera_calibration::error::CalibError;
use planar_camera_calibration::synthetic::{perturb_points, project_points};
use planar_camera_calibration::types::RvecTvec;

const IMAGE_SIZE: (u32, u32) = (640, 480);

fn target() -> TargetGeometry {
    TargetGeometry::new(9, 6, 0.03).unwrap()
}

fn k_gt() -> na::Matrix3<f64> {
    na::Matrix3::new(600.0, 0.0, 321.0, 0.0, 595.0, 238.0, 0.0, 0.0, 1.0)
}

fn poses() -> Vec<RvecTvec> {
    [
        ([0.25, -0.15, 0.05], [-0.16, -0.1, 0.55]),
        ([-0.3, 0.2, -0.1], [-0.1, -0.05, 0.6]),
        ([0.1, 0.35, 0.3], [-0.05, -0.12, 0.5]),
        ([-0.15, -0.3, -0.2], [-0.2, -0.02, 0.58]),
        ([0.35, 0.1, 0.0], [-0.08, -0.14, 0.52]),
        ([-0.05, 0.25, -0.35], [-0.14, -0.06, 0.62]),
    ]
    .iter()
    .map(|(r, t)| RvecTvec::new(&na::Vector3::from(*r), &na::Vector3::from(*t)))
    .collect()
}

fn observe(camera: &PinholeCamera<f64>, noise: f64) -> (ObjectPointSet, Vec<ImagePointSet>) {
    let target = target();
    let object_points = build_object_points(&target);
    let sets = poses()
        .iter()
        .enumerate()
        .map(|(i, pose)| {
            let mut pts = project_points(camera, pose, &object_points);
            perturb_points(&mut pts, noise, i as u64);
            ImagePointSet::new(pts, &target).unwrap()
        })
        .collect();
    (object_points, sets)
}

fn assert_k_close(result: &CalibrationResult, k: &na::Matrix3<f64>, rel: f64) {
    for (a, b) in result.k.iter().zip(k.iter()) {
        assert!(
            (a - b).abs() <= rel * b.abs().max(1.0),
            "K mismatch {} vs {}\n{}",
            a,
            b,
            result.k
        );
    }
}

#[test]
fn test_synthetic_recovery() {
    let camera = PinholeCamera::from_k(&k_gt(), &[], DistortionModel::RadTan5);
    let (object_points, sets) = observe(&camera, 0.0);
    let result = calibrate(&object_points, &sets, IMAGE_SIZE, &CalibrationOptions::default()).unwrap();

    assert_eq!(result.view_count(), 6);
    assert_eq!(result.dist_coeffs.len(), 5);
    assert!(result.rms < 1e-4, "rms {}", result.rms);
    assert_k_close(&result, &k_gt(), 1e-3);
    for (pose, t) in poses().iter().zip(&result.tvecs) {
        assert!((pose.tvec - t).norm() < 1e-3 * pose.tvec.norm());
    }
}

#[test]
fn test_noisy_recovery() {
    let camera = PinholeCamera::from_k(&k_gt(), &[], DistortionModel::RadTan5);
    let (object_points, sets) = observe(&camera, 0.2);
    let result = calibrate(&object_points, &sets, IMAGE_SIZE, &CalibrationOptions::default()).unwrap();
    // uniform noise of amplitude a has an rms norm of a * sqrt(2/3)
    assert!(result.rms < 0.2, "rms {}", result.rms);
    assert_k_close(&result, &k_gt(), 2e-2);
}

#[test]
fn test_distortion_recovery() {
    let dist = [-0.18, 0.06, 0.0012, -0.0008, 0.0];
    let camera = PinholeCamera::from_k(&k_gt(), &dist, DistortionModel::RadTan5);
    let (object_points, sets) = observe(&camera, 0.0);
    let result = calibrate(&object_points, &sets, IMAGE_SIZE, &CalibrationOptions::default()).unwrap();

    assert!(result.rms < 1e-3, "rms {}", result.rms);
    assert_k_close(&result, &k_gt(), 1e-3);
    assert!((result.dist_coeffs[0] - dist[0]).abs() < 5e-3, "{:?}", result.dist_coeffs);
    assert!((result.dist_coeffs[2] - dist[2]).abs() < 1e-4, "{:?}", result.dist_coeffs);
    assert!((result.dist_coeffs[3] - dist[3]).abs() < 1e-4, "{:?}", result.dist_coeffs);
}

#[test]
fn test_determinism() {
    let camera = PinholeCamera::from_k(&k_gt(), &[-0.1], DistortionModel::RadTan5);
    let (object_points, sets) = observe(&camera, 0.1);
    let options = CalibrationOptions::default();
    let a = calibrate(&object_points, &sets, IMAGE_SIZE, &options).unwrap();
    let b = calibrate(&object_points, &sets, IMAGE_SIZE, &options).unwrap();
    assert_eq!(a.view_indices, b.view_indices);
    assert!((a.k - b.k).norm() < 1e-9);
    assert!((a.rms - b.rms).abs() < 1e-12);
    for (x, y) in a.dist_coeffs.iter().zip(&b.dist_coeffs) {
        assert!((x - y).abs() < 1e-12);
    }
}

#[test]
fn test_view_order_does_not_matter() {
    let camera = PinholeCamera::from_k(&k_gt(), &[-0.1], DistortionModel::RadTan5);
    let (object_points, sets) = observe(&camera, 0.1);
    let options = CalibrationOptions::default();
    let forward = calibrate(&object_points, &sets, IMAGE_SIZE, &options).unwrap();
    let reversed_sets: Vec<_> = sets.iter().rev().cloned().collect();
    let backward = calibrate(&object_points, &reversed_sets, IMAGE_SIZE, &options).unwrap();

    let n = sets.len();
    assert_eq!(forward.view_indices, (0..n).collect::<Vec<_>>());
    assert_eq!(backward.view_indices, (0..n).collect::<Vec<_>>());
    assert!((forward.k - backward.k).norm() < 1e-8, "{} vs {}", forward.k, backward.k);
    assert!((forward.rms - backward.rms).abs() < 1e-10);
    for (x, y) in forward.dist_coeffs.iter().zip(&backward.dist_coeffs) {
        assert!((x - y).abs() < 1e-9);
    }
    // pose i of the reversed run belongs to view n - 1 - i
    for i in 0..n {
        let j = n - 1 - i;
        assert!((forward.rvecs[j] - backward.rvecs[i]).norm() < 1e-8);
        assert!((forward.tvecs[j] - backward.tvecs[i]).norm() < 1e-8);
    }
}

#[test]
fn test_flags_pin_coefficients() {
    let camera = PinholeCamera::from_k(&k_gt(), &[-0.1, 0.02], DistortionModel::RadTan5);
    let (object_points, sets) = observe(&camera, 0.05);
    let options = CalibrationOptions {
        flags: CalibrationFlags {
            zero_tangent_dist: true,
            fix_k3: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let result = calibrate(&object_points, &sets, IMAGE_SIZE, &options).unwrap();
    assert_eq!(result.dist_coeffs[2], 0.0);
    assert_eq!(result.dist_coeffs[3], 0.0);
    assert_eq!(result.dist_coeffs[4], 0.0);
    assert!((result.dist_coeffs[0] + 0.1).abs() < 2e-2);
}

#[test]
fn test_rational_model_has_eight_coefficients() {
    let camera = PinholeCamera::from_k(&k_gt(), &[], DistortionModel::Rational8);
    let (object_points, sets) = observe(&camera, 0.0);
    let options = CalibrationOptions {
        distortion_model: DistortionModel::Rational8,
        ..Default::default()
    };
    let result = calibrate(&object_points, &sets, IMAGE_SIZE, &options).unwrap();
    assert_eq!(result.distortion_model, DistortionModel::Rational8);
    assert_eq!(result.dist_coeffs.len(), 8);
    assert!(result.rms < 1e-3, "rms {}", result.rms);
}

#[test]
fn test_degenerate_view_is_dropped() {
    let camera = PinholeCamera::from_k(&k_gt(), &[], DistortionModel::RadTan5);
    let (object_points, mut sets) = observe(&camera, 0.0);
    let t = target();
    let line: Vec<_> = (0..t.point_count())
        .map(|i| na::Point2::new(100.0 + i as f64, 200.0))
        .collect();
    sets.insert(2, ImagePointSet::new(line, &t).unwrap());

    let result = calibrate(&object_points, &sets, IMAGE_SIZE, &CalibrationOptions::default()).unwrap();
    assert_eq!(result.view_indices, vec![0, 1, 3, 4, 5, 6]);
    assert_eq!(result.rvecs.len(), 6);
    assert!(result.rms < 1e-4, "rms {}", result.rms);
}

#[test]
fn test_only_degenerate_views() {
    let t = target();
    let object_points = build_object_points(&t);
    let line: Vec<_> = (0..t.point_count())
        .map(|i| na::Point2::new(10.0 + i as f64, 20.0 + 2.0 * i as f64))
        .collect();
    let sets = vec![ImagePointSet::new(line, &t).unwrap()];
    let err = calibrate(&object_points, &sets, IMAGE_SIZE, &CalibrationOptions::default());
    assert!(matches!(err, Err(CalibError::DegenerateGeometry(_))));
}

#[test]
fn test_zero_image_size() {
    let camera = PinholeCamera::from_k(&k_gt(), &[], DistortionModel::RadTan5);
    let (object_points, sets) = observe(&camera, 0.0);
    let err = calibrate(&object_points, &sets, (0, 480), &CalibrationOptions::default());
    assert!(matches!(err, Err(CalibError::InvalidInput(_))));
}
