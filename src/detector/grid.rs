use log::debug;
use nalgebra as na;

use crate::board::TargetGeometry;

/// A complete rectangle of corners indexed by grid position `(i, j)`.
#[derive(Debug, Clone)]
pub struct CornerGrid {
    pub width: usize,
    pub height: usize,
    /// `points[j * width + i]`
    pub points: Vec<na::Point2<f64>>,
}

impl CornerGrid {
    fn at(&self, i: usize, j: usize) -> na::Point2<f64> {
        self.points[j * self.width + i]
    }

    fn mean_steps(&self) -> (na::Vector2<f64>, na::Vector2<f64>) {
        let mut u = na::Vector2::zeros();
        let mut v = na::Vector2::zeros();
        for j in 0..self.height {
            for i in 0..self.width {
                if i + 1 < self.width {
                    u += self.at(i + 1, j) - self.at(i, j);
                }
                if j + 1 < self.height {
                    v += self.at(i, j + 1) - self.at(i, j);
                }
            }
        }
        (u, v)
    }

    /// Row-major corners in the canonical order for `target`.
    ///
    /// The column axis is the one holding `columns` corners (for square
    /// grids, the one closer to image x). Columns run towards +x and rows
    /// are chosen so that `column_step x row_step` points into the image.
    pub fn ordered_points(&self, target: &TargetGeometry) -> Option<Vec<na::Point2<f64>>> {
        let (cols, rows) = (target.columns(), target.rows());
        let (u, v) = self.mean_steps();
        let col_is_u = if self.width == self.height {
            u.x.abs() / u.norm().max(f64::EPSILON) >= v.x.abs() / v.norm().max(f64::EPSILON)
        } else if self.width == cols && self.height == rows {
            true
        } else if self.width == rows && self.height == cols {
            false
        } else {
            return None;
        };
        if col_is_u && (self.width, self.height) != (cols, rows) {
            return None;
        }
        let (mut col_step, row_step) = if col_is_u { (u, v) } else { (v, u) };
        let flip_cols = col_step.x < 0.0 || (col_step.x == 0.0 && col_step.y < 0.0);
        if flip_cols {
            col_step = -col_step;
        }
        let flip_rows = col_step.x * row_step.y - col_step.y * row_step.x < 0.0;

        let mut out = Vec::with_capacity(cols * rows);
        for r in 0..rows {
            for c in 0..cols {
                let cc = if flip_cols { cols - 1 - c } else { c };
                let rr = if flip_rows { rows - 1 - r } else { r };
                let (i, j) = if col_is_u { (cc, rr) } else { (rr, cc) };
                out.push(self.at(i, j));
            }
        }
        Some(out)
    }
}

/// Collects labeled corners `(i, j, position)` into a grid and accepts it
/// only when they cover a full `columns x rows` rectangle once each.
pub fn assemble_grid(
    labeled: &[((i32, i32), na::Point2<f64>)],
    target: &TargetGeometry,
) -> Option<CornerGrid> {
    let min_i = labeled.iter().map(|(k, _)| k.0).min()?;
    let max_i = labeled.iter().map(|(k, _)| k.0).max()?;
    let min_j = labeled.iter().map(|(k, _)| k.1).min()?;
    let max_j = labeled.iter().map(|(k, _)| k.1).max()?;
    let width = (max_i - min_i + 1) as usize;
    let height = (max_j - min_j + 1) as usize;
    let fits = (width, height) == (target.columns(), target.rows())
        || (width, height) == (target.rows(), target.columns());
    if !fits || labeled.len() != width * height {
        debug!(
            "{} labeled corners span {}x{}, expected {}x{}",
            labeled.len(),
            width,
            height,
            target.columns(),
            target.rows()
        );
        return None;
    }
    let mut slots: Vec<Option<na::Point2<f64>>> = vec![None; width * height];
    for ((i, j), p) in labeled {
        let slot = &mut slots[(j - min_j) as usize * width + (i - min_i) as usize];
        if slot.replace(*p).is_some() {
            debug!("grid position ({}, {}) labeled twice", i, j);
            return None;
        }
    }
    let points = slots.into_iter().collect::<Option<Vec<_>>>()?;
    Some(CornerGrid {
        width,
        height,
        points,
    })
}
