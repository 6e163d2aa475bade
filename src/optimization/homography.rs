use log::debug;
use nalgebra as na;

use crate::error::{CalibError, Result};

/// Ratio of the covariance eigenvalues below which a point set is treated as
/// a line.
const COLLINEAR_RATIO: f64 = 1e-8;

/// Hartley normalization: zero mean, mean distance sqrt(2).
fn normalize_points(points: &[na::Point2<f64>]) -> Option<(Vec<na::Point2<f64>>, na::Matrix3<f64>)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let centroid = points.iter().fold(na::Vector2::zeros(), |acc, p| acc + p.coords) / n;
    let mean_dist = points.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;
    if mean_dist < 1e-12 {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = na::Matrix3::new(
        s, 0.0, -s * centroid.x, //
        0.0, s, -s * centroid.y, //
        0.0, 0.0, 1.0,
    );
    let normalized = points
        .iter()
        .map(|p| na::Point2::from((p.coords - centroid) * s))
        .collect();
    Some((normalized, t))
}

/// True when all points lie (numerically) on one line.
pub fn is_collinear(points: &[na::Point2<f64>]) -> bool {
    if points.len() < 3 {
        return true;
    }
    let n = points.len() as f64;
    let c = points.iter().fold(na::Vector2::zeros(), |acc, p| acc + p.coords) / n;
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in points {
        let d = p.coords - c;
        sxx += d.x * d.x;
        sxy += d.x * d.y;
        syy += d.y * d.y;
    }
    let tr = sxx + syy;
    let det = sxx * syy - sxy * sxy;
    let disc = (tr * tr / 4.0 - det).max(0.0).sqrt();
    let l_max = tr / 2.0 + disc;
    if l_max <= 1e-300 {
        return true;
    }
    let l_min = det / l_max;
    l_min / l_max < COLLINEAR_RATIO
}

/// Right singular vector of the smallest singular value, i.e. the least
/// squares solution of `A x = 0` with `|x| = 1`.
pub(crate) fn null_vector(a: na::DMatrix<f64>) -> Option<na::DVector<f64>> {
    let cols = a.ncols();
    let a = if a.nrows() < cols {
        let mut padded = na::DMatrix::zeros(cols, cols);
        padded.view_mut((0, 0), (a.nrows(), cols)).copy_from(&a);
        padded
    } else {
        a
    };
    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|x, y| x.1.total_cmp(y.1))?;
    Some(v_t.row(min_idx).transpose())
}

/// Plane-to-image homography `x_img ~ H [X, Y, 1]` by normalized DLT.
///
/// Fails with `DegenerateGeometry` for fewer than four pairs or when either
/// side is collinear.
pub fn find_homography(
    plane_points: &[na::Point2<f64>],
    image_points: &[na::Point2<f64>],
) -> Result<na::Matrix3<f64>> {
    let n = plane_points.len();
    if n < 4 || image_points.len() != n {
        return Err(CalibError::DegenerateGeometry(format!(
            "need at least 4 correspondences, got {}",
            n.min(image_points.len())
        )));
    }
    if is_collinear(plane_points) || is_collinear(image_points) {
        return Err(CalibError::DegenerateGeometry(
            "points are collinear".to_string(),
        ));
    }
    let degenerate = || CalibError::DegenerateGeometry("cannot normalize points".to_string());
    let (world_n, t_w) = normalize_points(plane_points).ok_or_else(degenerate)?;
    let (image_n, t_i) = normalize_points(image_points).ok_or_else(degenerate)?;

    let mut a = na::DMatrix::<f64>::zeros(2 * n, 9);
    for (i, (pw, pi)) in world_n.iter().zip(&image_n).enumerate() {
        let (x, y, u, v) = (pw.x, pw.y, pi.x, pi.y);
        let r0 = 2 * i;
        let r1 = r0 + 1;
        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }
    let h_vec = null_vector(a)
        .ok_or_else(|| CalibError::DegenerateGeometry("svd failed".to_string()))?;
    let h_n = na::Matrix3::from_row_slice(h_vec.as_slice());
    let t_i_inv = t_i
        .try_inverse()
        .ok_or_else(|| CalibError::DegenerateGeometry("singular normalization".to_string()))?;
    let mut h = t_i_inv * h_n * t_w;
    if h[(2, 2)].abs() > f64::EPSILON {
        h /= h[(2, 2)];
    }
    if h.determinant().abs() < 1e-12 * h.norm().powi(3) || !h.iter().all(|v| v.is_finite()) {
        return Err(CalibError::DegenerateGeometry(
            "homography is singular".to_string(),
        ));
    }
    Ok(h)
}

fn v_ij(h: &na::Matrix3<f64>, i: usize, j: usize) -> na::SVector<f64, 6> {
    let hi = h.column(i);
    let hj = h.column(j);
    na::SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Pixel conditioning: image centre to origin, half the larger side to 1.
fn pixel_conditioning(image_size: (u32, u32)) -> na::Matrix3<f64> {
    let (w, h) = (image_size.0 as f64, image_size.1 as f64);
    let s = 2.0 / w.max(h).max(1.0);
    na::Matrix3::new(
        s, 0.0, -s * w / 2.0, //
        0.0, s, -s * h / 2.0, //
        0.0, 0.0, 1.0,
    )
}

/// Zhang's closed form intrinsics with zero skew enforced.
///
/// Needs three or more homographies; returns `None` when the system is
/// degenerate, e.g. when all views are near-parallel.
pub fn zhang_intrinsics(
    homographies: &[na::Matrix3<f64>],
    image_size: (u32, u32),
) -> Option<na::Matrix3<f64>> {
    if homographies.len() < 3 {
        return None;
    }
    let n_mat = pixel_conditioning(image_size);
    let m = homographies.len();
    let mut vmtx = na::DMatrix::<f64>::zeros(2 * m + 1, 6);
    for (k, h) in homographies.iter().enumerate() {
        let hc = n_mat * h;
        let hc = hc / hc.norm();
        let v11 = v_ij(&hc, 0, 0);
        let v22 = v_ij(&hc, 1, 1);
        let v12 = v_ij(&hc, 0, 1);
        vmtx.row_mut(2 * k).copy_from(&v12.transpose());
        vmtx.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }
    // skew = 0  <=>  B12 = 0
    vmtx[(2 * m, 1)] = 1.0;

    let b = null_vector(vmtx)?;
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    if denom_norm <= 0.0 || denom.abs() / denom_norm < 1e-9 {
        debug!("zhang: degenerate B matrix");
        return None;
    }
    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    let fx2 = lambda / b11;
    let fy2 = lambda * b11 / denom;
    if !(fx2 > 0.0 && fy2 > 0.0) {
        debug!("zhang: invalid sign for lambda");
        return None;
    }
    let alpha = fx2.sqrt();
    let beta = fy2.sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    let k_cond = na::Matrix3::new(alpha, 0.0, u0, 0.0, beta, v0, 0.0, 0.0, 1.0);
    let k = n_mat.try_inverse()? * k_cond;
    if k.iter().all(|v| v.is_finite()) {
        Some(k)
    } else {
        None
    }
}

/// Focal lengths with the principal point fixed at the image centre.
///
/// Uses orthogonality and equal norm of the first two rotation columns; works
/// from a single non-frontal view.
pub fn centered_intrinsics(
    homographies: &[na::Matrix3<f64>],
    image_size: (u32, u32),
) -> na::Matrix3<f64> {
    let cx = (image_size.0 as f64 - 1.0) / 2.0;
    let cy = (image_size.1 as f64 - 1.0) / 2.0;
    let shift = na::Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);
    let m = homographies.len();
    let mut a = na::DMatrix::<f64>::zeros(2 * m, 2);
    let mut b = na::DVector::<f64>::zeros(2 * m);
    for (i, h) in homographies.iter().enumerate() {
        let hc = shift * h;
        let h0 = hc.column(0).into_owned();
        let h1 = hc.column(1).into_owned();
        let d1 = ((h0 + h1) * 0.5).normalize();
        let d2 = ((h0 - h1) * 0.5).normalize();
        let c0 = h0.normalize();
        let c1 = h1.normalize();
        a[(2 * i, 0)] = c0[0] * c1[0];
        a[(2 * i, 1)] = c0[1] * c1[1];
        b[2 * i] = -c0[2] * c1[2];
        a[(2 * i + 1, 0)] = d1[0] * d2[0];
        a[(2 * i + 1, 1)] = d1[1] * d2[1];
        b[2 * i + 1] = -d1[2] * d2[2];
    }
    let fallback = image_size.0.max(image_size.1) as f64;
    let f = a
        .clone()
        .svd(true, true)
        .solve(&b, 1e-12)
        .ok()
        .filter(|f| f.iter().all(|v| v.is_finite() && v.abs() > 1e-12));
    let (fx, fy) = match f {
        Some(f) => ((1.0 / f[0].abs()).sqrt(), (1.0 / f[1].abs()).sqrt()),
        None => {
            debug!("focal estimate undetermined, using {}", fallback);
            (fallback, fallback)
        }
    };
    na::Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0)
}

/// Initial camera matrix: Zhang when possible, centred principal point otherwise.
pub fn init_intrinsics(
    homographies: &[na::Matrix3<f64>],
    image_size: (u32, u32),
) -> na::Matrix3<f64> {
    if let Some(k) = zhang_intrinsics(homographies, image_size) {
        debug!("zhang initial K:{}", k);
        return k;
    }
    let k = centered_intrinsics(homographies, image_size);
    debug!("centred initial K:{}", k);
    k
}
