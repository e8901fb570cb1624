//! FILM model loading and single-step inference via `ort::Session` + CUDA EP.
//!
//! Models live under `<models_root>/FILM/<style>/`: either the serialized
//! model sits at the top level of the style directory, or inside a
//! `saved_model/` subdirectory (the layout exported model archives unpack
//! to). The loader resolves whichever exists and fails with
//! [`FlowError::ModelNotFound`] otherwise; everything past that point is
//! delegated to the inference engine and propagates unmodified.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, ensure, Context, Result};
use ndarray::{s, Array2, Array3, Axis};
use ort::{
    execution_providers::{CUDAExecutionProvider, ExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use tracing::{debug, error, info};

use crate::error::FlowError;
use crate::interpolate::MidpointInterpolator;

/// Serialized-model marker file looked for at the top of a style directory.
pub const MODEL_MARKER: &str = "model.onnx";
const FILM_SUBDIR: &str = "FILM";
const SAVED_MODEL_SUBDIR: &str = "saved_model";

/// FILM needs both spatial dimensions padded to a multiple of 64
/// (feature pyramid depth).
const PAD_ALIGN: usize = 64;

const INPUT_FRAME0: &str = "x0";
const INPUT_FRAME1: &str = "x1";
const INPUT_TIME: &str = "time";
const OUTPUT_NAME: &str = "image";

/// Pretrained FILM variants, distinguished by training loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilmStyle {
    L1,
    Style,
    Vgg,
}

impl FilmStyle {
    pub const ALL: [FilmStyle; 3] = [FilmStyle::L1, FilmStyle::Style, FilmStyle::Vgg];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::Style => "Style",
            Self::Vgg => "VGG",
        }
    }

    /// Parse one of the closed set of preset names.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "L1" => Ok(Self::L1),
            "Style" => Ok(Self::Style),
            "VGG" => Ok(Self::Vgg),
            other => bail!("unsupported FILM style '{other}', expected one of L1|Style|VGG"),
        }
    }
}

impl std::fmt::Display for FilmStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Resolve the on-disk directory holding the serialized model for `style`.
///
/// Tries `<models_root>/FILM/<style>` first; if the marker file is not at
/// the top level, falls back to its `saved_model/` subdirectory.
pub fn resolve_model_dir(models_root: &Path, style: FilmStyle) -> Result<PathBuf, FlowError> {
    let mut dir = models_root.join(FILM_SUBDIR).join(style.dir_name());
    if !dir.join(MODEL_MARKER).exists() {
        dir = dir.join(SAVED_MODEL_SUBDIR);
    }

    if !dir.exists() {
        error!(path = %dir.display(), "FILM model directory does not exist");
        return Err(FlowError::ModelNotFound(dir));
    }

    Ok(dir)
}

/// List style directories under `<models_root>/FILM/` that resolve to a
/// loadable model, sorted by name. Used by the host UI to populate the
/// style selector.
pub fn installed_styles(models_root: &Path) -> Vec<String> {
    let mut styles: Vec<String> = FilmStyle::ALL
        .iter()
        .filter(|style| {
            let dir = models_root.join(FILM_SUBDIR).join(style.dir_name());
            dir.join(MODEL_MARKER).exists()
                || dir.join(SAVED_MODEL_SUBDIR).join(MODEL_MARKER).exists()
        })
        .map(|style| style.dir_name().to_string())
        .collect();
    styles.sort_unstable();
    styles
}

/// Loaded FILM inference handle.
///
/// Immutable after creation and reusable across any number of
/// interpolation runs; shared via `Arc` with no explicit teardown.
pub struct FilmModel {
    model_dir: PathBuf,
    accelerator_available: bool,
    session: Arc<Mutex<Session>>,
}

impl FilmModel {
    /// Resolve and load the serialized model for `style`.
    ///
    /// The only locally raised failure is [`FlowError::ModelNotFound`];
    /// session construction errors are the engine's own and pass through.
    pub fn load(models_root: &Path, style: FilmStyle) -> Result<Self> {
        let model_dir = resolve_model_dir(models_root, style)?;
        info!(path = %model_dir.display(), style = %style, "Loading FILM model");

        let cuda = CUDAExecutionProvider::default();
        let accelerator_available = cuda.is_available().unwrap_or(false);
        debug!(
            accelerator_available,
            "Building FILM session with CUDA EP (CPU fallback)"
        );

        let model_path = model_dir.join(MODEL_MARKER);
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers([cuda.build()])?
            .commit_from_file(&model_path)
            .with_context(|| format!("Failed to load FILM model: {}", model_path.display()))?;

        debug!("FILM model loaded successfully");

        Ok(Self {
            model_dir,
            accelerator_available,
            session: Arc::new(Mutex::new(session)),
        })
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Whether a hardware accelerator was available to the engine at load
    /// time. Observational only; inference works either way.
    pub fn accelerator_available(&self) -> bool {
        self.accelerator_available
    }
}

impl MidpointInterpolator for FilmModel {
    fn midpoint(&self, a: &Array3<f32>, b: &Array3<f32>) -> Result<Array3<f32>> {
        ensure!(
            a.dim() == b.dim(),
            "frame pair shape mismatch: {:?} vs {:?}",
            a.dim(),
            b.dim()
        );
        let (h, w, _) = a.dim();

        let x0 = pad_hwc(a).insert_axis(Axis(0));
        let x1 = pad_hwc(b).insert_axis(Axis(0));
        let time = Array2::<f32>::from_elem((1, 1), 0.5);

        let t0 = Tensor::from_array(x0)?;
        let t1 = Tensor::from_array(x1)?;
        let tt = Tensor::from_array(time)?;

        let mut session = self.session.lock().unwrap();
        let outputs = session.run(
            ort::inputs![INPUT_FRAME0 => &t0, INPUT_FRAME1 => &t1, INPUT_TIME => &tt],
        )?;
        let output = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;
        let output = output.to_owned().into_dimensionality::<ndarray::Ix4>()?;

        // Crop padding back off; the model emits the padded extent.
        Ok(output.slice(s![0, ..h, ..w, ..]).to_owned())
    }
}

fn pad_amount(dim: usize) -> usize {
    (PAD_ALIGN - (dim % PAD_ALIGN)) % PAD_ALIGN
}

/// Mirror a pad offset back into `0..extent`, tiling once the pad runs
/// past the image edge (frames smaller than the pad amount).
fn mirror_index(extent: usize, offset: usize) -> usize {
    extent - 1 - (offset % extent)
}

/// Reflection-pad an HWC frame so both spatial dimensions are 64-multiples.
fn pad_hwc(arr: &Array3<f32>) -> Array3<f32> {
    let (h, w, c) = arr.dim();
    let pad_h = pad_amount(h);
    let pad_w = pad_amount(w);

    if pad_h == 0 && pad_w == 0 {
        return arr.clone();
    }

    let mut padded = Array3::<f32>::zeros((h + pad_h, w + pad_w, c));
    padded.slice_mut(s![..h, ..w, ..]).assign(arr);

    // Bottom reflection: mirrored source row -> row (h+y)
    for y in 0..pad_h {
        let src = arr.slice(s![mirror_index(h, y), .., ..]).to_owned();
        padded.slice_mut(s![h + y, ..w, ..]).assign(&src);
    }

    // Right reflection over all rows (bottom rows are already filled)
    for x in 0..pad_w {
        let src = padded.slice(s![.., mirror_index(w, x), ..]).to_owned();
        padded.slice_mut(s![.., w + x, ..]).assign(&src);
    }

    padded
}
