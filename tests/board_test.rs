use nalgebra as na;
use planar_camera_calibration::board::{TargetGeometry, build_object_points};
use planar_camera_calibration::detected_points::{ImagePointSet, build_correspondences};
use planar_camera_calibration::error::CalibError;

#[test]
fn test_object_points_row_major() {
    let target = TargetGeometry::new(3, 2, 1.0).unwrap();
    let pts = build_object_points(&target);
    let expected = [
        (0.0, 0.0),
        (1.0, 0.0),
        (2.0, 0.0),
        (0.0, 1.0),
        (1.0, 1.0),
        (2.0, 1.0),
    ];
    assert_eq!(pts.len(), 6);
    for (p, (x, y)) in pts.iter().zip(expected) {
        assert_eq!(*p, na::Point3::new(x, y, 0.0));
    }
}

#[test]
fn test_cell_size_scales_points() {
    let target = TargetGeometry::new(4, 3, 0.025).unwrap();
    let pts = build_object_points(&target);
    let last = pts.last().unwrap();
    assert!((last.x - 0.075).abs() < 1e-12);
    assert!((last.y - 0.05).abs() < 1e-12);
}

#[test]
fn test_invalid_targets() {
    assert!(matches!(
        TargetGeometry::new(1, 5, 1.0),
        Err(CalibError::InvalidTarget(_))
    ));
    assert!(matches!(
        TargetGeometry::new(4, 3, 0.0),
        Err(CalibError::InvalidTarget(_))
    ));
    assert!(serde_json::from_str::<TargetGeometry>(r#"{"columns": 4, "rows": 3, "cell_size": -1.0}"#).is_err());
}

#[test]
fn test_correspondences_share_object_points() {
    let target = TargetGeometry::new(3, 2, 1.0).unwrap();
    let object_points = build_object_points(&target);
    let sets: Vec<_> = (0..2)
        .map(|v| {
            let pts = object_points
                .iter()
                .map(|p| na::Point2::new(p.x * 10.0 + v as f64, p.y * 10.0))
                .collect();
            ImagePointSet::new(pts, &target).unwrap()
        })
        .collect();
    let views = build_correspondences(&object_points, sets).unwrap();
    assert_eq!(views.len(), 2);
    assert!(std::sync::Arc::ptr_eq(&views[0].object_points, &views[1].object_points));
    let (p3, p2) = views[1].pairs().nth(4).unwrap();
    assert_eq!(p3.x, 1.0);
    assert_eq!(p2.x, 11.0);
}

#[test]
fn test_wrong_point_count() {
    let target = TargetGeometry::new(3, 2, 1.0).unwrap();
    let err = ImagePointSet::new(vec![na::Point2::origin(); 5], &target);
    assert!(matches!(err, Err(CalibError::InvalidInput(_))));
}
