//! Camera + MoveNet pose source for the desktop build.

use anyhow::Context;
use ndarray::Array4;
use opencv::{
    core::{AlgorithmHint, Mat, Size, Vec3f, CV_32FC3},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::time::Instant;

use crate::config::CameraConfig;
use crate::error::{CoachError, Result};

use super::landmark::{FrameSnapshot, Landmark, LandmarkLayout};
use super::source::PoseSource;

/// Square input side of the single-pose MoveNet models
const MOVENET_SIZE: i32 = 192;
const MOVENET_INPUT: &str = "serving_default_input_0";
const MOVENET_OUTPUT: &str = "StatefulPartitionedCall_0";

/// OpenCV camera feeding an ONNX MoveNet model.
///
/// The capture is released on drop.
pub struct MoveNetSource {
    capture: VideoCapture,
    session: Session,
    started: Instant,
}

impl MoveNetSource {
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let capture = open_camera(config)
            .map_err(|e| CoachError::SourceUnavailable(format!("{:#}", e)))?;
        let session = (|| -> anyhow::Result<Session> {
            Ok(Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .commit_from_file(&config.model_path)?)
        })()
        .map_err(|e| CoachError::SourceUnavailable(format!("pose model {}: {:#}", config.model_path, e)))?;
        Ok(Self {
            capture,
            session,
            started: Instant::now(),
        })
    }

    /// One camera frame through the model, keypoints in MoveNet order
    fn landmarks(&mut self) -> anyhow::Result<Vec<Landmark>> {
        let mut frame = Mat::default();
        self.capture.read(&mut frame).context("camera read failed")?;
        if frame.empty() {
            anyhow::bail!("camera returned an empty frame");
        }
        let input = Tensor::from_array(movenet_input(&frame)?)?;
        let outputs = self
            .session
            .run(ort::inputs![MOVENET_INPUT => input])
            .context("pose inference failed")?;
        let keypoints: ndarray::ArrayViewD<f32> = outputs[MOVENET_OUTPUT]
            .try_extract_array()
            .context("pose output is not an f32 tensor")?;

        let flat: Vec<f32> = keypoints.iter().copied().collect();
        Ok(decode_keypoints(&flat))
    }
}

impl PoseSource for MoveNetSource {
    fn next_frame(&mut self) -> Result<Option<FrameSnapshot>> {
        let timestamp_ms = self.started.elapsed().as_millis() as u64;
        let landmarks = self
            .landmarks()
            .map_err(|e| CoachError::Source(format!("{:#}", e)))?;
        Ok(Some(FrameSnapshot::new(timestamp_ms, LandmarkLayout::MoveNet17, landmarks)))
    }
}

impl Drop for MoveNetSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("camera release failed: {}", e);
        } else {
            tracing::debug!("camera released");
        }
    }
}

fn open_camera(config: &CameraConfig) -> anyhow::Result<VideoCapture> {
    let mut capture = VideoCapture::new(config.index, VideoCaptureAPIs::CAP_ANY as i32)
        .with_context(|| format!("camera {}", config.index))?;
    if !capture.is_opened()? {
        anyhow::bail!("camera {} did not open", config.index);
    }
    capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.width as f64)?;
    capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.height as f64)?;
    capture.set(videoio::CAP_PROP_FPS, 30.0)?;
    capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;
    tracing::info!(
        "camera {} opened at {}x{}",
        config.index,
        capture.get(videoio::CAP_PROP_FRAME_WIDTH)?,
        capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?
    );
    Ok(capture)
}

/// BGR camera frame as a [1, 192, 192, 3] RGB tensor with 0-255 values
fn movenet_input(frame: &Mat) -> anyhow::Result<Array4<f32>> {
    let mut resized = Mat::default();
    imgproc::resize(frame, &mut resized, Size::new(MOVENET_SIZE, MOVENET_SIZE), 0.0, 0.0, imgproc::INTER_LINEAR)?;
    let mut rgb = Mat::default();
    imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;
    let mut pixels = Mat::default();
    rgb.convert_to(&mut pixels, CV_32FC3, 1.0, 0.0)?;

    let data: Vec<f32> = pixels.data_typed::<Vec3f>()?.iter().flat_map(|p| p.0).collect();
    let side = MOVENET_SIZE as usize;
    Ok(Array4::from_shape_vec((1, side, side, 3), data)?)
}

/// Flattened [1, 1, 17, 3] model output, each keypoint as (y, x, score)
fn decode_keypoints(flat: &[f32]) -> Vec<Landmark> {
    flat.chunks_exact(3)
        .take(LandmarkLayout::MoveNet17.count())
        .map(|k| Landmark::new(k[1], k[0], 0.0, k[2]))
        .collect()
}
