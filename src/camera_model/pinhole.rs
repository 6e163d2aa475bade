use super::DistortionModel;
use nalgebra as na;

/// Pinhole camera with Brown-Conrady style distortion.
///
/// Generic over the scalar so residuals can be evaluated with dual numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct PinholeCamera<T: na::RealField> {
    pub fx: T,
    pub fy: T,
    pub cx: T,
    pub cy: T,
    pub dist: na::DVector<T>,
    pub model: DistortionModel,
}

impl<T: na::RealField> PinholeCamera<T> {
    /// `intrinsics` is `[fx, fy, cx, cy]`, `dist` holds `model.coeff_count()` values.
    pub fn new(
        intrinsics: &na::DVector<T>,
        dist: &na::DVector<T>,
        model: DistortionModel,
    ) -> PinholeCamera<T> {
        debug_assert_eq!(intrinsics.len(), 4);
        debug_assert_eq!(dist.len(), model.coeff_count());
        PinholeCamera {
            fx: intrinsics[0].clone(),
            fy: intrinsics[1].clone(),
            cx: intrinsics[2].clone(),
            cy: intrinsics[3].clone(),
            dist: dist.clone(),
            model,
        }
    }

    /// Applies distortion to normalized image coordinates.
    pub fn distort(&self, x: T, y: T) -> (T, T) {
        let d = &self.dist;
        let one = T::one();
        let two = T::from_f64(2.0).unwrap();
        let r2 = x.clone() * x.clone() + y.clone() * y.clone();
        let r4 = r2.clone() * r2.clone();
        let r6 = r4.clone() * r2.clone();
        let (k1, k2, p1, p2) = (d[0].clone(), d[1].clone(), d[2].clone(), d[3].clone());

        let mut radial = one.clone() + k1 * r2.clone() + k2 * r4.clone();
        if self.model.coeff_count() >= 5 {
            radial += d[4].clone() * r6.clone();
        }
        if self.model == DistortionModel::Rational8 {
            radial /= one + d[5].clone() * r2.clone() + d[6].clone() * r4 + d[7].clone() * r6;
        }
        let xy = x.clone() * y.clone();
        let xd = x.clone() * radial.clone()
            + two.clone() * p1.clone() * xy.clone()
            + p2.clone() * (r2.clone() + two.clone() * x.clone() * x);
        let yd = y.clone() * radial
            + p1 * (r2 + two.clone() * y.clone() * y)
            + two * p2 * xy;
        (xd, yd)
    }

    /// Projects a point given in camera coordinates to pixels.
    pub fn project_one(&self, pt: &na::Vector3<T>) -> na::Vector2<T> {
        let x = pt[0].clone() / pt[2].clone();
        let y = pt[1].clone() / pt[2].clone();
        let (xd, yd) = self.distort(x, y);
        na::Vector2::new(
            self.fx.clone() * xd + self.cx.clone(),
            self.fy.clone() * yd + self.cy.clone(),
        )
    }
}

impl PinholeCamera<f64> {
    pub fn from_k(k: &na::Matrix3<f64>, dist: &[f64], model: DistortionModel) -> PinholeCamera<f64> {
        let mut coeffs = na::DVector::zeros(model.coeff_count());
        for (c, d) in coeffs.iter_mut().zip(dist) {
            *c = *d;
        }
        PinholeCamera {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
            dist: coeffs,
            model,
        }
    }

    pub fn k_matrix(&self) -> na::Matrix3<f64> {
        na::Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn intrinsics(&self) -> na::DVector<f64> {
        na::dvector![self.fx, self.fy, self.cx, self.cy]
    }

    /// Projects a world point through `p_cam = R * p + t`.
    pub fn project_world(
        &self,
        rotation: &na::Matrix3<f64>,
        tvec: &na::Vector3<f64>,
        p3d: &na::Point3<f64>,
    ) -> na::Point2<f64> {
        let pc = rotation * p3d.coords + tvec;
        na::Point2::from(self.project_one(&pc))
    }

    /// Removes distortion from a pixel, returning the ideal pinhole pixel.
    ///
    /// Fixed point iteration on the normalized coordinates.
    pub fn undistort_point(&self, p: &na::Point2<f64>) -> na::Point2<f64> {
        let x0 = (p.x - self.cx) / self.fx;
        let y0 = (p.y - self.cy) / self.fy;
        let (mut x, mut y) = (x0, y0);
        for _ in 0..20 {
            let (xd, yd) = self.distort(x, y);
            let (ex, ey) = (xd - x0, yd - y0);
            x -= ex;
            y -= ey;
            if ex * ex + ey * ey < 1e-24 {
                break;
            }
        }
        na::Point2::new(x * self.fx + self.cx, y * self.fy + self.cy)
    }
}
