use nalgebra as na;
use planar_camera_calibration::types::{
    RvecTvec, ToRvecTvec, matrix_to_rvec, resolve_pose, resolve_poses, rvec_to_matrix,
};

#[test]
fn test_rvec_tvec_conversion() {
    let rvec_in = na::Vector3::new(0.1, 0.2, 0.3);
    let tvec_in = na::Vector3::new(1.0, 2.0, 3.0);

    let rt = RvecTvec::new(&rvec_in, &tvec_in);
    let rt_back = rt.to_na_isometry3().to_rvec_tvec();

    assert!((rt_back.na_rvec() - rvec_in).norm() < 1e-9);
    assert!((rt_back.na_tvec() - tvec_in).norm() < 1e-9);
}

#[test]
fn test_identity_pose() {
    let pose = resolve_pose(&na::Vector3::zeros(), &na::Vector3::new(0.0, 0.0, 5.0));
    assert!((pose.position - na::Vector3::new(0.0, 0.0, -5.0)).norm() < 1e-12);
    assert!((pose.x_axis - na::Vector3::x()).norm() < 1e-12);
    assert!((pose.y_axis - na::Vector3::y()).norm() < 1e-12);
    assert!((pose.z_axis - na::Vector3::z()).norm() < 1e-12);
}

#[test]
fn test_pose_maps_back_to_camera_origin() {
    let rvec = na::Vector3::new(-0.4, 0.25, 1.2);
    let tvec = na::Vector3::new(0.3, -0.2, 2.0);
    let pose = resolve_pose(&rvec, &tvec);
    // the camera centre expressed in the camera frame is the origin
    let in_camera = rvec_to_matrix(&rvec) * pose.position + tvec;
    assert!(in_camera.norm() < 1e-12);
    // the optical axis is the third row of R
    let r = rvec_to_matrix(&rvec);
    assert!((pose.z_axis - r.row(2).transpose()).norm() < 1e-12);
    assert!((pose.x_axis.cross(&pose.y_axis) - pose.z_axis).norm() < 1e-12);
}

#[test]
fn test_resolve_poses_keeps_order() {
    let rvecs = vec![na::Vector3::zeros(), na::Vector3::new(0.0, 0.0, 0.5)];
    let tvecs = vec![na::Vector3::new(0.0, 0.0, 1.0), na::Vector3::new(0.0, 0.0, 2.0)];
    let poses = resolve_poses(&rvecs, &tvecs);
    assert_eq!(poses.len(), 2);
    assert!((poses[1].position.z + 2.0).abs() < 1e-12);
}

#[test]
fn test_rotation_round_trip() {
    let rvec = na::Vector3::new(0.7, -0.3, 0.2);
    let back = matrix_to_rvec(&rvec_to_matrix(&rvec));
    assert!((back - rvec).norm() < 1e-8);
}
