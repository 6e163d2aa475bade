use nalgebra as na;

use crate::board::{ObjectPointSet, TargetGeometry};
use crate::error::{CalibError, Result};

/// Detected corners of one image, row-major, exactly `columns * rows` long.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePointSet {
    points: Vec<na::Point2<f64>>,
}

impl ImagePointSet {
    pub fn new(points: Vec<na::Point2<f64>>, target: &TargetGeometry) -> Result<ImagePointSet> {
        if points.len() != target.point_count() {
            return Err(CalibError::InvalidInput(format!(
                "expected {} image points for a {}x{} target, got {}",
                target.point_count(),
                target.columns(),
                target.rows(),
                points.len()
            )));
        }
        Ok(ImagePointSet { points })
    }
    pub fn points(&self) -> &[na::Point2<f64>] {
        &self.points
    }
    pub fn len(&self) -> usize {
        self.points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One view's 2D/3D pairs. The object points are shared, not copied.
#[derive(Debug, Clone)]
pub struct ViewCorrespondence {
    pub object_points: ObjectPointSet,
    pub image_points: ImagePointSet,
}

impl ViewCorrespondence {
    pub fn pairs(&self) -> impl Iterator<Item = (&na::Point3<f64>, &na::Point2<f64>)> {
        self.object_points.iter().zip(self.image_points.points())
    }
}

/// Pairs every detected point set with the shared target points.
pub fn build_correspondences(
    object_points: &ObjectPointSet,
    image_point_sets: Vec<ImagePointSet>,
) -> Result<Vec<ViewCorrespondence>> {
    image_point_sets
        .into_iter()
        .map(|image_points| {
            if image_points.len() != object_points.len() {
                return Err(CalibError::InvalidInput(format!(
                    "view has {} points but the target has {}",
                    image_points.len(),
                    object_points.len()
                )));
            }
            Ok(ViewCorrespondence {
                object_points: object_points.clone(),
                image_points,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::build_object_points;
    use std::sync::Arc;

    #[test]
    fn views_share_object_points() {
        let target = TargetGeometry::new(3, 2, 1.0).unwrap();
        let obj = build_object_points(&target);
        let set = |off: f64| {
            ImagePointSet::new(
                (0..6).map(|i| na::Point2::new(i as f64 + off, 0.0)).collect(),
                &target,
            )
            .unwrap()
        };
        let views = build_correspondences(&obj, vec![set(0.0), set(10.0)]).unwrap();
        assert_eq!(views.len(), 2);
        assert!(Arc::ptr_eq(&views[0].object_points, &views[1].object_points));
        assert!(Arc::ptr_eq(&views[0].object_points, &obj));
        let (p3, p2) = views[1].pairs().nth(4).unwrap();
        assert_eq!(*p3, na::Point3::new(1.0, 1.0, 0.0));
        assert_eq!(*p2, na::Point2::new(14.0, 0.0));
    }

    #[test]
    fn partial_point_sets_are_rejected() {
        let target = TargetGeometry::new(3, 2, 1.0).unwrap();
        let pts = vec![na::Point2::new(0.0, 0.0); 5];
        assert!(ImagePointSet::new(pts, &target).is_err());
    }
}
