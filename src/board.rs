use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{CalibError, Result};

/// Checkerboard description: inner corners along each axis and their spacing.
///
/// `cell_size` is in the unit the translations should come out in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTargetGeometry")]
pub struct TargetGeometry {
    columns: usize,
    rows: usize,
    cell_size: f64,
}

#[derive(Deserialize)]
struct RawTargetGeometry {
    columns: usize,
    rows: usize,
    cell_size: f64,
}

impl TryFrom<RawTargetGeometry> for TargetGeometry {
    type Error = CalibError;
    fn try_from(raw: RawTargetGeometry) -> Result<Self> {
        TargetGeometry::new(raw.columns, raw.rows, raw.cell_size)
    }
}

impl Default for TargetGeometry {
    fn default() -> Self {
        Self {
            columns: 10,
            rows: 7,
            cell_size: 0.0025,
        }
    }
}

impl TargetGeometry {
    pub fn new(columns: usize, rows: usize, cell_size: f64) -> Result<TargetGeometry> {
        if columns < 2 || rows < 2 {
            return Err(CalibError::InvalidTarget(format!(
                "pattern needs at least 2x2 inner corners, got {}x{}",
                columns, rows
            )));
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(CalibError::InvalidTarget(format!(
                "cell size must be positive, got {}",
                cell_size
            )));
        }
        Ok(TargetGeometry {
            columns,
            rows,
            cell_size,
        })
    }
    pub fn columns(&self) -> usize {
        self.columns
    }
    pub fn rows(&self) -> usize {
        self.rows
    }
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }
    pub fn point_count(&self) -> usize {
        self.columns * self.rows
    }
}

/// 3D target points on the Z=0 plane, shared by every view.
pub type ObjectPointSet = Arc<Vec<na::Point3<f64>>>;

/// Generates the target points row by row, columns inner.
///
/// The detector emits corners in the same order, which is what binds the
/// i-th image point to the i-th object point.
pub fn build_object_points(target: &TargetGeometry) -> ObjectPointSet {
    let mut pts = Vec::with_capacity(target.point_count());
    for r in 0..target.rows {
        for c in 0..target.columns {
            pts.push(na::Point3::new(
                c as f64 * target.cell_size,
                r as f64 * target.cell_size,
                0.0,
            ));
        }
    }
    Arc::new(pts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_small_or_flat_targets() {
        assert!(TargetGeometry::new(1, 5, 1.0).is_err());
        assert!(TargetGeometry::new(5, 1, 1.0).is_err());
        assert!(TargetGeometry::new(5, 5, 0.0).is_err());
        assert!(TargetGeometry::new(5, 5, f64::NAN).is_err());
        assert!(TargetGeometry::new(2, 2, 0.01).is_ok());
    }

    #[test]
    fn deserialize_validates() {
        let ok: TargetGeometry =
            serde_json::from_str(r#"{"columns": 9, "rows": 6, "cell_size": 0.025}"#).unwrap();
        assert_eq!(ok.point_count(), 54);
        let bad = serde_json::from_str::<TargetGeometry>(
            r#"{"columns": 9, "rows": 6, "cell_size": -1.0}"#,
        );
        assert!(bad.is_err());
    }
}
