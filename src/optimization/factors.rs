use nalgebra as na;
use tiny_solver::factors::Factor;

use crate::camera_model::{DistortionModel, PinholeCamera};
use crate::types::rvec_to_matrix;

/// Pixel residual of one target corner in one view.
///
/// Parameter blocks: `[intrinsics(4), distortion(n), rvec(3), tvec(3)]`.
#[derive(Debug, Clone)]
pub struct ReprojectionFactor {
    pub p3d: na::Vector3<f64>,
    pub p2d: na::Vector2<f64>,
    pub model: DistortionModel,
}

impl ReprojectionFactor {
    pub fn new(
        p3d: &na::Point3<f64>,
        p2d: &na::Point2<f64>,
        model: DistortionModel,
    ) -> ReprojectionFactor {
        ReprojectionFactor {
            p3d: p3d.coords,
            p2d: p2d.coords,
            model,
        }
    }
}

impl<T: na::RealField> Factor<T> for ReprojectionFactor {
    fn residual_func(&self, params: &[na::DVector<T>]) -> na::DVector<T> {
        let camera = PinholeCamera::new(&params[0], &params[1], self.model);
        let rvec = na::Vector3::new(
            params[2][0].clone(),
            params[2][1].clone(),
            params[2][2].clone(),
        );
        let tvec = na::Vector3::new(
            params[3][0].clone(),
            params[3][1].clone(),
            params[3][2].clone(),
        );
        let p3d: na::Vector3<T> = self.p3d.map(|v| T::from_f64(v).unwrap());
        let p3d_t = rvec_to_matrix(&rvec) * p3d + tvec;
        let p2d_p = camera.project_one(&p3d_t);

        na::dvector![
            p2d_p[0].clone() - T::from_f64(self.p2d[0]).unwrap(),
            p2d_p[1].clone() - T::from_f64(self.p2d[1]).unwrap()
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residual_vanishes_at_ground_truth() {
        let intr = na::dvector![500.0, 500.0, 320.0, 240.0];
        let dist = na::dvector![0.0, 0.0, 0.0, 0.0, 0.0];
        let p3d = na::Point3::new(0.1, 0.2, 0.0);
        let rvec = na::dvector![0.0, 0.0, 0.0];
        let tvec = na::dvector![0.0, 0.0, 2.0];
        let factor = ReprojectionFactor::new(
            &p3d,
            &na::Point2::new(500.0 * 0.05 + 320.0, 500.0 * 0.1 + 240.0),
            DistortionModel::RadTan5,
        );
        let params = vec![intr.clone(), dist.clone(), rvec.clone(), tvec];
        assert!(factor.residual_func(&params).norm() < 1e-9);

        let params_bad = vec![intr, dist, rvec, na::dvector![0.1, 0.0, 2.0]];
        assert!(factor.residual_func(&params_bad).norm() > 1.0);
    }
}
