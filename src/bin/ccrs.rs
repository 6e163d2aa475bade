use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use log::{error, info};
use nalgebra as na;
use planar_camera_calibration::board::{TargetGeometry, build_object_points};
use planar_camera_calibration::camera_model::{DistortionModel, PinholeCamera};
use planar_camera_calibration::data_loader::{ImageSequence, list_images, load_image};
use planar_camera_calibration::error::{CalibError, Result};
use planar_camera_calibration::io::{
    load_calibration, object_from_json, save_calibration, write_report,
};
use planar_camera_calibration::pipeline::{self, PipelineConfig};
use planar_camera_calibration::selection::{FrameSelector, LineKeys};
use planar_camera_calibration::synthetic::{random_poses, write_dataset};
use planar_camera_calibration::types::resolve_poses;
use planar_camera_calibration::util::view_reprojection_stats;
use planar_camera_calibration::visualization::{log_frames, render};

#[derive(Parser)]
#[command(version, about, author)]
struct CCRSCli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate a camera from chessboard images
    Calibrate {
        /// path to image folder
        img_dir: PathBuf,

        /// inner corners per row
        columns: usize,

        /// inner corners per column
        rows: usize,

        /// output calibration json
        save_path: PathBuf,

        /// square size, the unit of the output translations [default: 0.0025]
        #[arg(long)]
        cell_size: Option<f64>,

        #[arg(long, value_enum)]
        distortion_model: Option<DistortionModel>,

        #[arg(long, action)]
        fix_principal_point: bool,

        /// force p1 = p2 = 0
        #[arg(long, action)]
        zero_tangent: bool,

        #[arg(long, action)]
        fix_k3: bool,

        #[arg(long)]
        max_iterations: Option<usize>,

        #[arg(long, default_value = "0")]
        start_idx: usize,

        #[arg(long, default_value = "1")]
        step: usize,

        /// json with `target`, `detector` and `calibration` sections
        #[arg(long)]
        config: Option<PathBuf>,

        /// text report with per view reprojection errors
        #[arg(long)]
        report: Option<PathBuf>,

        /// save images, detections and poses to a rerun file
        #[arg(long)]
        rrd: Option<PathBuf>,
    },

    /// Show the camera poses of a saved calibration in rerun
    Visualize {
        calibration_file: PathBuf,

        columns: usize,

        rows: usize,

        #[arg(long, default_value = "1.0")]
        cell_size: f64,

        /// axis length of each camera frame, defaults to one board width
        #[arg(long)]
        axis_length: Option<f64>,

        /// save to a rerun file instead of spawning the viewer
        #[arg(long)]
        rrd: Option<PathBuf>,
    },

    /// Pick frames from an image sequence, one key per stdin line
    /// (space / enter / esc)
    Select {
        frames_dir: PathBuf,

        columns: usize,

        rows: usize,

        output_dir: PathBuf,

        /// take every frame without asking
        #[arg(long, action)]
        select_all: bool,
    },

    /// Render a synthetic calibration dataset with known ground truth
    Generate {
        output_dir: PathBuf,

        columns: usize,

        rows: usize,

        #[arg(long, default_value = "0.04")]
        cell_size: f64,

        #[arg(long, default_value = "20")]
        num_frames: usize,

        #[arg(long, default_value = "640")]
        width: u32,

        #[arg(long, default_value = "480")]
        height: u32,

        #[arg(long, default_value = "600.0")]
        focal: f64,

        /// radial distortion k1 of the rendered camera
        #[arg(long, default_value = "0.0")]
        k1: f64,

        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

#[allow(clippy::too_many_arguments)]
fn run_calibrate(
    img_dir: &Path,
    target: TargetGeometry,
    save_path: &Path,
    config: PipelineConfig,
    start_idx: usize,
    step: usize,
    report: Option<&Path>,
    rrd: Option<&Path>,
) -> Result<()> {
    let paths = list_images(img_dir, start_idx, step)?;
    if paths.is_empty() {
        return Err(CalibError::InsufficientData(format!(
            "no images found in {}",
            img_dir.display()
        )));
    }
    info!("loading {} images", paths.len());
    let images = paths
        .iter()
        .map(|p| load_image(p))
        .collect::<Result<Vec<_>>>()?;

    let now = Instant::now();
    let output = pipeline::run(&images, &target, &config.detector, &config.calibration)?;
    info!("calibration took {:.3} sec", now.elapsed().as_secs_f64());
    let result = &output.result;
    info!("rms: {:.5} px over {} views", result.rms, result.view_count());
    info!("K: {}", result.k);
    info!("distortion: {:?}", result.dist_coeffs);

    save_calibration(save_path, result)?;
    info!("saved to {}", save_path.display());

    if let Some(report_path) = report {
        let stats = view_reprojection_stats(result, &output.views);
        let names: Vec<String> = output
            .image_indices
            .iter()
            .map(|&i| {
                paths[i]
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            })
            .collect();
        write_report(report_path, result, &stats, &names)?;
        info!("report written to {}", report_path.display());
    }

    if let Some(rrd_path) = rrd {
        let recording = rerun::RecordingStreamBuilder::new("calibration").save(rrd_path)?;
        log_frames(&recording, "/cam0", &images, &output.detections)?;
        let poses = resolve_poses(&result.rvecs, &result.tvecs);
        let board_width = (target.columns() - 1) as f64 * target.cell_size();
        render(&recording, &build_object_points(&target), &poses, board_width)?;
        info!("rerun recording saved to {}", rrd_path.display());
    }
    Ok(())
}

fn run_visualize(
    calibration_file: &Path,
    target: TargetGeometry,
    axis_length: Option<f64>,
    rrd: Option<&Path>,
) -> Result<()> {
    let result = load_calibration(calibration_file)?;
    let poses = resolve_poses(&result.rvecs, &result.tvecs);
    info!("{} camera poses loaded", poses.len());
    let recording = match rrd {
        Some(path) => rerun::RecordingStreamBuilder::new("calibration_poses").save(path)?,
        None => rerun::RecordingStreamBuilder::new("calibration_poses").spawn()?,
    };
    let axis_length =
        axis_length.unwrap_or((target.columns() - 1) as f64 * target.cell_size());
    render(&recording, &build_object_points(&target), &poses, axis_length)
}

fn run_select(
    frames_dir: &Path,
    target: TargetGeometry,
    output_dir: &Path,
    select_all: bool,
) -> Result<()> {
    let mut frames = ImageSequence::open(frames_dir, 0, 1)?;
    let stdin = std::io::stdin();
    let mut keys = LineKeys::new(stdin.lock());
    let mut selector = FrameSelector::new(target, Default::default(), select_all);
    let selected = selector.run(&mut frames, &mut keys)?;

    std::fs::create_dir_all(output_dir).map_err(|e| CalibError::io(output_dir, e))?;
    for frame in &selected {
        let path = output_dir.join(format!("frame_{:04}.png", frame.index));
        frame.image.save(&path)?;
    }
    info!("{} frames written to {}", selected.len(), output_dir.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_generate(
    output_dir: &Path,
    target: TargetGeometry,
    num_frames: usize,
    width: u32,
    height: u32,
    focal: f64,
    k1: f64,
    seed: u64,
) -> Result<()> {
    let k = na::Matrix3::new(
        focal,
        0.0,
        width as f64 / 2.0,
        0.0,
        focal,
        height as f64 / 2.0,
        0.0,
        0.0,
        1.0,
    );
    let camera = PinholeCamera::from_k(&k, &[k1], DistortionModel::RadTan5);
    // keep the board at roughly half the image width
    let board_width = (target.columns() + 1) as f64 * target.cell_size();
    let distance = 2.0 * focal * board_width / width as f64;
    let poses = random_poses(&target, num_frames, distance, 0.35, seed);
    write_dataset(output_dir, &camera, &target, &poses, (width, height))?;
    info!("{} frames generated in {}", num_frames, output_dir.display());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => object_from_json(p),
        None => Ok(PipelineConfig::default()),
    }
}

fn run(cli: CCRSCli) -> Result<()> {
    match cli.command {
        Commands::Calibrate {
            img_dir,
            columns,
            rows,
            save_path,
            cell_size,
            distortion_model,
            fix_principal_point,
            zero_tangent,
            fix_k3,
            max_iterations,
            start_idx,
            step,
            config,
            report,
            rrd,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(model) = distortion_model {
                config.calibration.distortion_model = model;
            }
            if let Some(n) = max_iterations {
                config.calibration.max_iterations = n;
            }
            let flags = &mut config.calibration.flags;
            flags.fix_principal_point |= fix_principal_point;
            flags.zero_tangent_dist |= zero_tangent;
            flags.fix_k3 |= fix_k3;
            let cell_size = cell_size
                .or(config.target.map(|t| t.cell_size()))
                .unwrap_or(0.0025);
            let target = TargetGeometry::new(columns, rows, cell_size)?;
            run_calibrate(
                &img_dir,
                target,
                &save_path,
                config,
                start_idx,
                step,
                report.as_deref(),
                rrd.as_deref(),
            )
        }
        Commands::Visualize {
            calibration_file,
            columns,
            rows,
            cell_size,
            axis_length,
            rrd,
        } => {
            let target = TargetGeometry::new(columns, rows, cell_size)?;
            run_visualize(&calibration_file, target, axis_length, rrd.as_deref())
        }
        Commands::Select {
            frames_dir,
            columns,
            rows,
            output_dir,
            select_all,
        } => {
            let target = TargetGeometry::new(columns, rows, 1.0)?;
            run_select(&frames_dir, target, &output_dir, select_all)
        }
        Commands::Generate {
            output_dir,
            columns,
            rows,
            cell_size,
            num_frames,
            width,
            height,
            focal,
            k1,
            seed,
        } => {
            let target = TargetGeometry::new(columns, rows, cell_size)?;
            run_generate(
                &output_dir, target, num_frames, width, height, focal, k1, seed,
            )
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = CCRSCli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}
