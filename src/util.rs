use crate::calibration::{CalibrationResult, reprojection_errors};
use crate::detected_points::ViewCorrespondence;

/// Reprojection error summary of one view, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReprojectionStats {
    pub average: f64,
    pub median: f64,
    pub max: f64,
    pub point_count: usize,
}

impl ReprojectionStats {
    pub fn from_errors(errors: &[f64]) -> ReprojectionStats {
        if errors.is_empty() {
            return ReprojectionStats {
                average: 0.0,
                median: 0.0,
                max: 0.0,
                point_count: 0,
            };
        }
        let mut sorted = errors.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        ReprojectionStats {
            average: sorted.iter().sum::<f64>() / n as f64,
            median,
            max: sorted[n - 1],
            point_count: n,
        }
    }
}

/// Stats for every calibrated view. `views` must be co-indexed with the poses.
pub fn view_reprojection_stats(
    result: &CalibrationResult,
    views: &[ViewCorrespondence],
) -> Vec<ReprojectionStats> {
    reprojection_errors(result, views)
        .iter()
        .map(|e| ReprojectionStats::from_errors(e))
        .collect()
}
