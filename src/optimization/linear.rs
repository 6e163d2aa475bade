use nalgebra as na;

use crate::error::{CalibError, Result};
use crate::types::{RvecTvec, matrix_to_rvec};

/// Decomposes a plane-to-image homography into the target pose, given `K`.
///
/// The rotation is projected onto SO(3) and the sign is chosen so the target
/// lies in front of the camera.
pub fn init_pose(k: &na::Matrix3<f64>, h: &na::Matrix3<f64>) -> Result<RvecTvec> {
    let degenerate = |msg: &str| CalibError::DegenerateGeometry(msg.to_string());
    let k_inv = k
        .try_inverse()
        .ok_or_else(|| degenerate("camera matrix is not invertible"))?;
    let k_inv_h1 = k_inv * h.column(0);
    let k_inv_h2 = k_inv * h.column(1);
    let norm1 = k_inv_h1.norm();
    let norm2 = k_inv_h2.norm();
    if norm1 <= 1e-12 || norm2 <= 1e-12 {
        return Err(degenerate("homography columns vanish"));
    }
    let lambda = 2.0 / (norm1 + norm2);
    let mut r1 = k_inv_h1 * lambda;
    let mut r2 = k_inv_h2 * lambda;
    let mut t = k_inv * h.column(2) * lambda;
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }
    let r3 = r1.cross(&r2);
    if r3.norm() <= 1e-12 {
        return Err(degenerate("rotation columns are parallel"));
    }
    let r_mat = na::Matrix3::from_columns(&[r1, r2, r3]);

    let svd = r_mat.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(degenerate("svd failed during pose extraction")),
    };
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }
    Ok(RvecTvec::new(&matrix_to_rvec(&r_orth), &t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_pose_from_exact_homography() {
        let k = na::Matrix3::new(800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0);
        let rvec = na::Vector3::new(0.2, -0.1, 0.05);
        let tvec = na::Vector3::new(-0.1, 0.05, 0.8);
        let r = na::Rotation3::new(rvec).into_inner();
        let mut h = na::Matrix3::zeros();
        h.set_column(0, &(k * r.column(0)));
        h.set_column(1, &(k * r.column(1)));
        h.set_column(2, &(k * tvec));
        // arbitrary negative scale must not flip the target behind the camera
        let rt = init_pose(&k, &(h * -3.0)).unwrap();
        assert!((rt.rvec - rvec).norm() < 1e-9);
        assert!((rt.tvec - tvec).norm() < 1e-9);
    }
}
