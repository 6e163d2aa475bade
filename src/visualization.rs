use std::io::Cursor;

use image::DynamicImage;
use rerun::{RecordingStream, TimeCell};

use crate::board::ObjectPointSet;
use crate::detected_points::ImagePointSet;
use crate::error::Result;
use crate::types::CameraPose;

const AXIS_COLORS: [(u8, u8, u8); 3] = [(230, 40, 40), (40, 200, 40), (40, 80, 230)];

fn to_f32(v: &nalgebra::Vector3<f64>) -> (f32, f32, f32) {
    (v.x as f32, v.y as f32, v.z as f32)
}

/// Logs the target points, a world frame at the origin and one axis triad
/// per camera, each axis `axis_length` long.
pub fn render(
    recording: &RecordingStream,
    object_points: &ObjectPointSet,
    poses: &[CameraPose],
    axis_length: f64,
) -> Result<()> {
    recording.log_static(
        "world/target",
        &rerun::Points3D::new(
            object_points
                .iter()
                .map(|p| (p.x as f32, p.y as f32, p.z as f32)),
        )
        .with_radii([rerun::Radius::new_ui_points(3.0)])
        .with_colors([rerun::Color::from_rgb(200, 200, 200)]),
    )?;

    let colors = AXIS_COLORS.map(|(r, g, b)| rerun::Color::from_rgb(r, g, b));
    let l = axis_length as f32;
    recording.log_static(
        "world/origin",
        &rerun::Arrows3D::from_vectors([(l, 0.0, 0.0), (0.0, l, 0.0), (0.0, 0.0, l)])
            .with_colors(colors)
            .with_labels(["X world", "Y world", "Z world"]),
    )?;

    for (i, pose) in poses.iter().enumerate() {
        let axes = [pose.x_axis, pose.y_axis, pose.z_axis].map(|a| to_f32(&(a * axis_length)));
        let origin = to_f32(&pose.position);
        recording.log_static(
            format!("world/cam{}", i),
            &rerun::Arrows3D::from_vectors(axes)
                .with_origins([origin; 3])
                .with_colors(colors),
        )?;
        recording.log_static(
            format!("world/cam{}/center", i),
            &rerun::Points3D::new([origin])
                .with_labels([format!("cam{}", i)])
                .with_radii([rerun::Radius::new_ui_points(4.0)]),
        )?;
    }
    Ok(())
}

pub fn log_image(recording: &RecordingStream, topic: &str, img: &DynamicImage) -> Result<()> {
    let mut bytes: Vec<u8> = Vec::new();
    img.to_luma8()
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    recording.log(
        format!("{}/image", topic),
        &rerun::EncodedImage::from_file_contents(bytes),
    )?;
    Ok(())
}

/// rerun puts (0, 0) at the top left corner of the first pixel.
pub fn rerun_shift(p2ds: &[nalgebra::Point2<f64>]) -> Vec<(f32, f32)> {
    p2ds.iter()
        .map(|p| (p.x as f32 + 0.5, p.y as f32 + 0.5))
        .collect()
}

/// Logs detected corners coloured along the canonical order.
pub fn log_detections(
    recording: &RecordingStream,
    topic: &str,
    points: &ImagePointSet,
) -> Result<()> {
    let n = points.len();
    let colors: Vec<_> = (0..n)
        .map(|i| {
            let c = colorous::TURBO.eval_rational(i, n.max(1));
            rerun::Color::from_rgb(c.r, c.g, c.b)
        })
        .collect();
    let labels: Vec<_> = (0..n).map(|i| i.to_string()).collect();
    recording.log(
        format!("{}/pts", topic),
        &rerun::Points2D::new(rerun_shift(points.points()))
            .with_colors(colors)
            .with_labels(labels)
            .with_radii([rerun::Radius::new_ui_points(4.0)]),
    )?;
    Ok(())
}

/// Logs every image and its detection on the `image` sequence timeline.
pub fn log_frames(
    recording: &RecordingStream,
    topic: &str,
    images: &[DynamicImage],
    detections: &[Option<ImagePointSet>],
) -> Result<()> {
    for (i, img) in images.iter().enumerate() {
        recording.set_time("image", TimeCell::from_sequence(i as i64));
        log_image(recording, topic, img)?;
        if let Some(Some(points)) = detections.get(i) {
            log_detections(recording, topic, points)?;
        }
    }
    Ok(())
}
