use std::path::{Path, PathBuf};

use glob::glob;
use image::{DynamicImage, ImageReader};

use crate::error::{CalibError, Result};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

fn img_filter(rp: glob::GlobResult) -> Option<PathBuf> {
    let p = rp.ok()?;
    let ext = p.extension()?.to_str()?.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(p)
    } else {
        None
    }
}

/// Image files directly inside `dir`, sorted by file name, then sub-sampled.
pub fn list_images(dir: &Path, start_idx: usize, step: usize) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CalibError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }
    let pattern = dir.join("*");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| CalibError::InvalidInput(format!("non utf-8 path {}", dir.display())))?;
    let img_paths = glob(pattern).map_err(|e| CalibError::InvalidInput(e.to_string()))?;
    let mut sorted_path: Vec<PathBuf> = img_paths.filter_map(img_filter).collect();
    sorted_path.sort();
    Ok(sorted_path
        .into_iter()
        .skip(start_idx)
        .step_by(step.max(1))
        .collect())
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    log::trace!("loading {}", path.display());
    let reader = ImageReader::open(path).map_err(|e| CalibError::io(path, e))?;
    Ok(reader.with_guessed_format().map_err(|e| CalibError::io(path, e))?.decode()?)
}

/// Loads every image of `dir` into memory, in file name order.
pub fn load_images_from_dir(
    dir: &Path,
    start_idx: usize,
    step: usize,
) -> Result<Vec<(PathBuf, DynamicImage)>> {
    list_images(dir, start_idx, step)?
        .into_iter()
        .map(|p| {
            let img = load_image(&p)?;
            Ok((p, img))
        })
        .collect()
}

/// A source that hands out frames one at a time, e.g. a stepped video.
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<DynamicImage>>;

    /// Number of frames left, when known.
    fn remaining(&self) -> Option<usize> {
        None
    }
}

/// Frames stored as numbered image files, one per video frame.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequence {
    pub fn open(dir: &Path, start_idx: usize, step: usize) -> Result<ImageSequence> {
        Ok(ImageSequence {
            paths: list_images(dir, start_idx, step)?,
            cursor: 0,
        })
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> ImageSequence {
        ImageSequence { paths, cursor: 0 }
    }

    /// Path of the frame most recently returned by `next_frame`.
    pub fn current_path(&self) -> Option<&Path> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.paths.get(i))
            .map(|p| p.as_path())
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let img = load_image(path)?;
        self.cursor += 1;
        Ok(Some(img))
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.paths.len() - self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str, value: u8) {
        image::GrayImage::from_pixel(8, 6, image::Luma([value]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn lists_sorted_and_stepped() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in ["c.png", "a.png", "b.jpg", "d.png"].iter().enumerate() {
            write_png(dir.path(), name, i as u8);
        }
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let all = list_images(dir.path(), 0, 1).unwrap();
        let names: Vec<_> = all
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg", "c.png", "d.png"]);

        let stepped = list_images(dir.path(), 1, 2).unwrap();
        assert_eq!(stepped, vec![all[1].clone(), all[3].clone()]);
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let err = list_images(Path::new("/definitely/not/here"), 0, 1);
        assert!(matches!(err, Err(CalibError::Io { .. })));
    }

    #[test]
    fn sequence_yields_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "0001.png", 10);
        write_png(dir.path(), "0002.png", 20);
        let mut seq = ImageSequence::open(dir.path(), 0, 1).unwrap();
        assert_eq!(seq.remaining(), Some(2));
        let first = seq.next_frame().unwrap().unwrap();
        assert_eq!(first.to_luma8().get_pixel(0, 0)[0], 10);
        assert!(seq.current_path().unwrap().ends_with("0001.png"));
        assert!(seq.next_frame().unwrap().is_some());
        assert!(seq.next_frame().unwrap().is_none());
    }
}
