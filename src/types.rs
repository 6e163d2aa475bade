use nalgebra as na;

/// World-to-camera transform in its compact form: axis-angle rotation and
/// translation, `p_cam = R(rvec) * p_world + tvec`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RvecTvec {
    pub rvec: na::Vector3<f64>,
    pub tvec: na::Vector3<f64>,
}

impl RvecTvec {
    pub fn new(rvec: &na::Vector3<f64>, tvec: &na::Vector3<f64>) -> RvecTvec {
        RvecTvec {
            rvec: *rvec,
            tvec: *tvec,
        }
    }
    pub fn na_rvec(&self) -> na::Vector3<f64> {
        self.rvec
    }
    pub fn na_tvec(&self) -> na::Vector3<f64> {
        self.tvec
    }
    pub fn rotation_matrix(&self) -> na::Matrix3<f64> {
        rvec_to_matrix(&self.rvec)
    }
    pub fn to_na_isometry3(&self) -> na::Isometry3<f64> {
        let rot = na::Rotation3::from_matrix_unchecked(self.rotation_matrix());
        na::Isometry3::from_parts(
            na::Translation3::from(self.tvec),
            na::UnitQuaternion::from_rotation_matrix(&rot),
        )
    }
}

pub trait ToRvecTvec {
    fn to_rvec_tvec(&self) -> RvecTvec;
}

impl ToRvecTvec for na::Isometry3<f64> {
    fn to_rvec_tvec(&self) -> RvecTvec {
        RvecTvec {
            rvec: self.rotation.scaled_axis(),
            tvec: self.translation.vector,
        }
    }
}

fn skew<T: na::RealField>(v: &na::Vector3<T>) -> na::Matrix3<T> {
    let zero = T::zero();
    na::Matrix3::new(
        zero.clone(),
        -v[2].clone(),
        v[1].clone(),
        v[2].clone(),
        zero.clone(),
        -v[0].clone(),
        -v[1].clone(),
        v[0].clone(),
        zero,
    )
}

/// Rodrigues formula, generic so the optimizer can differentiate through it.
///
/// `R = I + sin(t)/t [r]x + (1 - cos(t))/t^2 [r]x^2` with `t = |r|`; below
/// 1e-6 rad the first order expansion is used.
pub fn rvec_to_matrix<T: na::RealField>(rvec: &na::Vector3<T>) -> na::Matrix3<T> {
    let k = skew(rvec);
    let theta2 = rvec.norm_squared();
    if theta2 < T::from_f64(1e-12).unwrap() {
        return na::Matrix3::identity() + k;
    }
    let theta = theta2.clone().sqrt();
    let a = theta.clone().sin() / theta.clone();
    let b = (T::one() - theta.cos()) / theta2;
    let k2 = &k * &k;
    na::Matrix3::identity() + k * a + k2 * b
}

/// Inverse of [`rvec_to_matrix`]; the input is projected onto SO(3) first.
pub fn matrix_to_rvec(mat: &na::Matrix3<f64>) -> na::Vector3<f64> {
    let rot = na::Rotation3::from_matrix(mat);
    na::UnitQuaternion::from_rotation_matrix(&rot).scaled_axis()
}

/// Camera placement in world (target) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: na::Vector3<f64>,
    pub x_axis: na::Vector3<f64>,
    pub y_axis: na::Vector3<f64>,
    pub z_axis: na::Vector3<f64>,
}

/// Inverts the world-to-camera transform of one view.
pub fn resolve_pose(rvec: &na::Vector3<f64>, tvec: &na::Vector3<f64>) -> CameraPose {
    let rt = rvec_to_matrix(rvec).transpose();
    CameraPose {
        position: -(rt * tvec),
        x_axis: rt * na::Vector3::x(),
        y_axis: rt * na::Vector3::y(),
        z_axis: rt * na::Vector3::z(),
    }
}

pub fn resolve_poses(rvecs: &[na::Vector3<f64>], tvecs: &[na::Vector3<f64>]) -> Vec<CameraPose> {
    rvecs
        .iter()
        .zip(tvecs)
        .map(|(r, t)| resolve_pose(r, t))
        .collect()
}
