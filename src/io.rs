use std::io::Write;
use std::path::Path;

use nalgebra as na;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::calibration::CalibrationResult;
use crate::camera_model::DistortionModel;
use crate::error::{CalibError, Result};
use crate::util::ReprojectionStats;

/// Serializes an object to a JSON file.
pub fn object_to_json<T: Serialize>(output_path: impl AsRef<Path>, object: &T) -> Result<()> {
    let output_path = output_path.as_ref();
    let j = serde_json::to_string_pretty(object)?;
    let mut file =
        std::fs::File::create(output_path).map_err(|e| CalibError::io(output_path, e))?;
    file.write_all(j.as_bytes())
        .map_err(|e| CalibError::io(output_path, e))
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T> {
    let file_path = file_path.as_ref();
    let contents =
        std::fs::read_to_string(file_path).map_err(|e| CalibError::io(file_path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// On-disk layout of a calibration, plain nested lists only.
#[derive(Debug, Serialize, Deserialize)]
struct CalibrationRecord {
    rvecs: Vec<Vec<f64>>,
    tvecs: Vec<Vec<f64>>,
    #[serde(rename = "K")]
    k: Vec<Vec<f64>>,
    #[serde(rename = "distCoeffs", alias = "dist_coeff")]
    dist_coeffs: Vec<f64>,
    rms: f64,
    #[serde(rename = "distortionModel", default, skip_serializing_if = "Option::is_none")]
    distortion_model: Option<DistortionModel>,
    #[serde(rename = "imageSize", default, skip_serializing_if = "Option::is_none")]
    image_size: Option<[u32; 2]>,
    #[serde(rename = "viewIndices", default, skip_serializing_if = "Option::is_none")]
    view_indices: Option<Vec<usize>>,
}

impl From<&CalibrationResult> for CalibrationRecord {
    fn from(result: &CalibrationResult) -> Self {
        CalibrationRecord {
            rvecs: result.rvecs.iter().map(|v| v.iter().copied().collect()).collect(),
            tvecs: result.tvecs.iter().map(|v| v.iter().copied().collect()).collect(),
            k: result
                .k
                .row_iter()
                .map(|r| r.iter().copied().collect())
                .collect(),
            dist_coeffs: result.dist_coeffs.clone(),
            rms: result.rms,
            distortion_model: Some(result.distortion_model),
            image_size: result.image_size.map(|(w, h)| [w, h]),
            view_indices: Some(result.view_indices.clone()),
        }
    }
}

fn vector3(values: &[f64], field: &str, idx: usize) -> Result<na::Vector3<f64>> {
    match values {
        [x, y, z] => Ok(na::Vector3::new(*x, *y, *z)),
        _ => Err(CalibError::Malformed(format!(
            "{}[{}] has {} elements, expected 3",
            field,
            idx,
            values.len()
        ))),
    }
}

impl TryFrom<CalibrationRecord> for CalibrationResult {
    type Error = CalibError;

    fn try_from(record: CalibrationRecord) -> Result<Self> {
        if record.k.len() != 3 || record.k.iter().any(|r| r.len() != 3) {
            return Err(CalibError::Malformed("K must be 3x3".to_string()));
        }
        let k = na::Matrix3::from_fn(|r, c| record.k[r][c]);
        let distortion_model = match record.distortion_model {
            Some(m) => m,
            None => DistortionModel::from_coeff_count(record.dist_coeffs.len()).ok_or_else(|| {
                CalibError::Malformed(format!(
                    "cannot infer a distortion model from {} coefficients",
                    record.dist_coeffs.len()
                ))
            })?,
        };
        if record.dist_coeffs.len() != distortion_model.coeff_count() {
            return Err(CalibError::Malformed(format!(
                "{:?} needs {} coefficients, found {}",
                distortion_model,
                distortion_model.coeff_count(),
                record.dist_coeffs.len()
            )));
        }
        if record.rvecs.len() != record.tvecs.len() {
            return Err(CalibError::Malformed(format!(
                "{} rvecs but {} tvecs",
                record.rvecs.len(),
                record.tvecs.len()
            )));
        }
        let rvecs = record
            .rvecs
            .iter()
            .enumerate()
            .map(|(i, v)| vector3(v, "rvecs", i))
            .collect::<Result<Vec<_>>>()?;
        let tvecs = record
            .tvecs
            .iter()
            .enumerate()
            .map(|(i, v)| vector3(v, "tvecs", i))
            .collect::<Result<Vec<_>>>()?;
        let view_indices = record
            .view_indices
            .unwrap_or_else(|| (0..rvecs.len()).collect());
        if view_indices.len() != rvecs.len() {
            return Err(CalibError::Malformed(
                "viewIndices is not co-indexed with rvecs".to_string(),
            ));
        }
        Ok(CalibrationResult {
            k,
            dist_coeffs: record.dist_coeffs,
            distortion_model,
            rvecs,
            tvecs,
            rms: record.rms,
            image_size: record.image_size.map(|[w, h]| (w, h)),
            view_indices,
        })
    }
}

pub fn save_calibration(path: impl AsRef<Path>, result: &CalibrationResult) -> Result<()> {
    object_to_json(path, &CalibrationRecord::from(result))
}

pub fn load_calibration(path: impl AsRef<Path>) -> Result<CalibrationResult> {
    let record: CalibrationRecord = object_from_json(path)?;
    CalibrationResult::try_from(record)
}

fn timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    format!(
        "{}-{:02}-{:02} {:02}:{:02}:{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Writes a human readable calibration report to a text file.
///
/// `stats` and `image_names` are co-indexed with the poses of `result`.
pub fn write_report(
    output_path: impl AsRef<Path>,
    result: &CalibrationResult,
    stats: &[ReprojectionStats],
    image_names: &[String],
) -> Result<()> {
    let mut s = String::new();
    s += format!("Calibration report {}\n\n", timestamp()).as_str();
    if let Some((w, h)) = result.image_size {
        s += format!("image size: {}x{}\n", w, h).as_str();
    }
    s += format!("views: {}\n", result.view_count()).as_str();
    s += format!("rms: {:.5} px\n", result.rms).as_str();
    s += format!("distortion model: {:?}\n", result.distortion_model).as_str();
    s += "K:\n";
    for r in result.k.row_iter() {
        s += format!("    {:12.5} {:12.5} {:12.5}\n", r[0], r[1], r[2]).as_str();
    }
    s += format!("distortion: {:?}\n\n", result.dist_coeffs).as_str();
    for (i, st) in stats.iter().enumerate() {
        match image_names.get(i) {
            Some(name) => s += format!("view{} ({}):\n", i, name).as_str(),
            None => s += format!("view{}:\n", i).as_str(),
        }
        s += format!("    average reprojection error: {:.5} px\n", st.average).as_str();
        s += format!("    median  reprojection error: {:.5} px\n", st.median).as_str();
        s += format!("    max     reprojection error: {:.5} px\n\n", st.max).as_str();
    }
    let output_path = output_path.as_ref();
    std::fs::write(output_path, s).map_err(|e| CalibError::io(output_path, e))
}
