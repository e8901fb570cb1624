use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, ensure, Context, Result};
use ndarray::{s, Array3, Array4};
use serde::{Deserialize, Serialize};

use crate::film::FilmModel;

/// Image representation at different pipeline stages.
#[derive(Clone)]
pub enum Frame {
    /// Interleaved CPU bytes (RGB24 or RGB48).
    CpuRgb {
        data: Vec<u8>,
        width: u32,
        height: u32,
        bit_depth: u8,
    },
    /// Normalized float32 tensor in [0,1], HWC layout, 3 channels.
    /// This is the representation every synthesized frame is returned in.
    HwcF32 {
        data: Vec<f32>,
        height: u32,
        width: u32,
    },
}

impl Frame {
    /// Returns `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Frame::CpuRgb { width, height, .. } => (*width, *height),
            Frame::HwcF32 { width, height, .. } => (*width, *height),
        }
    }

    /// Convert to a `[H, W, 3]` float tensor in [0,1].
    pub fn to_hwc(&self) -> Result<Array3<f32>> {
        match self {
            Frame::CpuRgb {
                data,
                width,
                height,
                bit_depth,
            } => {
                let h = *height as usize;
                let w = *width as usize;
                match bit_depth {
                    8 => {
                        let expected = h * w * 3;
                        if data.len() != expected {
                            bail!(
                                "Data length mismatch: expected {} ({}x{}x3), got {}",
                                expected,
                                h,
                                w,
                                data.len()
                            );
                        }
                        let floats = data.iter().map(|&v| v as f32 / 255.0).collect();
                        Array3::from_shape_vec((h, w, 3), floats)
                            .context("failed to reshape RGB24 data to [H,W,3]")
                    }
                    16 => {
                        let expected = h * w * 3 * 2;
                        if data.len() != expected {
                            bail!(
                                "Data length mismatch for 16-bit: expected {}, got {}",
                                expected,
                                data.len()
                            );
                        }
                        let floats = data
                            .chunks_exact(2)
                            .map(|c| u16::from_le_bytes([c[0], c[1]]) as f32 / 65535.0)
                            .collect();
                        Array3::from_shape_vec((h, w, 3), floats)
                            .context("failed to reshape RGB48 data to [H,W,3]")
                    }
                    other => bail!("Unsupported bit depth: {other} (expected 8 or 16)"),
                }
            }
            Frame::HwcF32 {
                data,
                height,
                width,
            } => {
                let h = *height as usize;
                let w = *width as usize;
                ensure!(
                    data.len() == h * w * 3,
                    "HwcF32 data length mismatch: expected {} ({h}x{w}x3), got {}",
                    h * w * 3,
                    data.len()
                );
                Array3::from_shape_vec((h, w, 3), data.clone())
                    .context("failed to reshape HwcF32 data to [H,W,3]")
            }
        }
    }

    /// Wrap a `[H, W, 3]` float tensor as a host frame, without resampling.
    pub fn from_hwc(arr: Array3<f32>) -> Result<Frame> {
        let (h, w, c) = arr.dim();
        ensure!(c == 3, "expected a 3-channel HWC tensor, got {c} channels");
        let data: Vec<f32> = arr.iter().copied().collect();
        Ok(Frame::HwcF32 {
            data,
            height: h as u32,
            width: w as u32,
        })
    }
}

/// Ordered sequence of frames with identical spatial dimensions.
///
/// The empty batch is valid and flows through interpolation unchanged.
#[derive(Clone, Default)]
pub struct ImageBatch {
    frames: Vec<Frame>,
}

impl ImageBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a batch, validating that all frames share dimensions.
    pub fn from_frames(frames: Vec<Frame>) -> Result<Self> {
        let mut batch = Self::new();
        for frame in frames {
            batch.push(frame)?;
        }
        Ok(batch)
    }

    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if let Some(first) = self.frames.first() {
            let expected = first.dimensions();
            let got = frame.dimensions();
            ensure!(
                got == expected,
                "batch dimension mismatch: expected {}x{}, got {}x{}",
                expected.0,
                expected.1,
                got.0,
                got.1
            );
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Concatenate the batch into a single `[N, H, W, 3]` tensor,
    /// preserving frame order.
    pub fn stack(&self) -> Result<Array4<f32>> {
        ensure!(!self.is_empty(), "cannot stack an empty batch");
        let (w, h) = self.frames[0].dimensions();
        let (h, w) = (h as usize, w as usize);

        let mut stacked = Array4::<f32>::zeros((self.frames.len(), h, w, 3));
        for (i, frame) in self.frames.iter().enumerate() {
            let hwc = frame.to_hwc()?;
            stacked.slice_mut(s![i, .., .., ..]).assign(&hwc);
        }
        Ok(stacked)
    }
}

/// Port type identifier for connection validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    Images,
    Model,
    Int,
    Float,
    Str,
    Bool,
    Path,
}

impl PortType {
    pub fn is_compatible(&self, other: &PortType) -> bool {
        self == other
    }
}

/// Data types that can flow between node ports.
#[derive(Clone)]
pub enum PortData {
    Images(ImageBatch),
    Model(Arc<FilmModel>),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Path(PathBuf),
}
