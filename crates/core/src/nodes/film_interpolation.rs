//! FILM interpolation node: recursive binary frame synthesis between each
//! pair of consecutive input frames.
//!
//! Unlike a one-in-one-out filter node, this node expands the batch: depth
//! `d` inserts `2^d - 1` synthesized frames between each adjacent pair, so
//! `n` input frames produce `(n-1) * (2^d - 1)` output frames. The output
//! contains only synthesized frames; the originals are not re-inserted.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, ensure, Result};
use ndarray::Array3;
use tracing::{debug, warn};

use crate::film::FilmModel;
use crate::interpolate::{expected_frames, interpolate_batch};
use crate::node::{ExecutionContext, Node, PortDefinition};
use crate::types::{Frame, ImageBatch, PortData, PortType};

pub const MIN_DEPTH: i64 = 1;
pub const MAX_DEPTH: i64 = 50;
pub const DEFAULT_DEPTH: i64 = 2;

pub struct FilmInterpolationNode;

impl FilmInterpolationNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FilmInterpolationNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for FilmInterpolationNode {
    fn node_type(&self) -> &str {
        "FilmInterpolation"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![
            PortDefinition {
                name: "images".to_string(),
                port_type: PortType::Images,
                required: true,
                default_value: None,
            },
            PortDefinition {
                name: "interpolate".to_string(),
                port_type: PortType::Int,
                required: false,
                default_value: Some(serde_json::json!(DEFAULT_DEPTH)),
            },
            PortDefinition {
                name: "film_model".to_string(),
                port_type: PortType::Model,
                required: true,
                default_value: None,
            },
        ]
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![PortDefinition {
            name: "images".to_string(),
            port_type: PortType::Images,
            required: true,
            default_value: None,
        }]
    }

    fn execute(
        &mut self,
        inputs: &HashMap<String, PortData>,
        ctx: &ExecutionContext,
    ) -> Result<HashMap<String, PortData>> {
        let images = match inputs.get("images") {
            Some(PortData::Images(batch)) => batch,
            Some(_) => bail!("images must be an ImageBatch"),
            None => bail!("images is required"),
        };

        // Empty batch is a no-op: returned unchanged, no progress events,
        // the model handle is never touched.
        if images.is_empty() {
            debug!("empty input batch, nothing to interpolate");
            return Ok(HashMap::from([(
                "images".to_string(),
                PortData::Images(images.clone()),
            )]));
        }

        let depth = match inputs.get("interpolate") {
            Some(PortData::Int(d)) => *d,
            Some(_) => bail!("interpolate must be an Int"),
            None => DEFAULT_DEPTH,
        };
        ensure!(
            (MIN_DEPTH..=MAX_DEPTH).contains(&depth),
            "interpolate must be in [{MIN_DEPTH},{MAX_DEPTH}], got {depth}"
        );
        let depth = depth as u32;

        let model: Arc<FilmModel> = match inputs.get("film_model") {
            Some(PortData::Model(m)) => m.clone(),
            Some(_) => bail!("film_model must be a Model"),
            None => bail!("film_model is required"),
        };

        if !model.accelerator_available() {
            warn!("No GPU available to the inference engine, falling back to CPU. This will be very slow");
        } else {
            debug!("GPU available to the inference engine");
        }

        let n = images.len();
        let total = expected_frames(n, depth);
        debug!(input_frames = n, depth, total, "Will interpolate");

        if let Some(progress) = &ctx.progress {
            progress.begin(total);
        }

        let in_frames: Vec<Array3<f32>> = images
            .frames()
            .iter()
            .map(Frame::to_hwc)
            .collect::<Result<_>>()?;

        let produced = interpolate_batch(model.as_ref(), &in_frames, depth, ctx)?;

        let out_frames: Vec<Frame> = produced
            .into_iter()
            .map(Frame::from_hwc)
            .collect::<Result<_>>()?;
        let out = ImageBatch::from_frames(out_frames)?;

        debug!(output_frames = out.len(), "Interpolation complete");
        Ok(HashMap::from([(
            "images".to_string(),
            PortData::Images(out),
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ProgressSink;

    fn ctx_with_progress() -> (ExecutionContext, Arc<ProgressSink>) {
        let sink = Arc::new(ProgressSink::new());
        let ctx = ExecutionContext {
            progress: Some(sink.clone()),
            ..ExecutionContext::default()
        };
        (ctx, sink)
    }

    #[test]
    fn test_node_ports() {
        let node = FilmInterpolationNode::new();
        assert_eq!(node.node_type(), "FilmInterpolation");

        let inputs = node.input_ports();
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[0].name, "images");
        assert!(inputs[0].required);
        assert_eq!(inputs[1].name, "interpolate");
        assert_eq!(inputs[1].default_value, Some(serde_json::json!(2)));
        assert_eq!(inputs[2].name, "film_model");
        assert_eq!(inputs[2].port_type, PortType::Model);

        let outputs = node.output_ports();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].port_type, PortType::Images);
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let mut node = FilmInterpolationNode::new();
        let (ctx, sink) = ctx_with_progress();

        // No model handle supplied at all: the empty batch must return
        // before the node ever looks at it.
        let inputs = HashMap::from([(
            "images".to_string(),
            PortData::Images(ImageBatch::new()),
        )]);

        let outputs = node.execute(&inputs, &ctx).unwrap();
        let Some(PortData::Images(batch)) = outputs.get("images") else {
            panic!("expected an images output");
        };
        assert!(batch.is_empty());
        assert_eq!(sink.value(), 0);
        assert_eq!(sink.total(), 0);
    }

    #[test]
    fn test_missing_images_is_an_error() {
        let mut node = FilmInterpolationNode::new();
        let ctx = ExecutionContext::default();

        let err = node
            .execute(&HashMap::new(), &ctx)
            .err()
            .expect("should fail");
        assert_eq!(err.to_string(), "images is required");
    }

    #[test]
    fn test_depth_out_of_range_rejected() {
        let mut node = FilmInterpolationNode::new();
        let ctx = ExecutionContext::default();

        let frame = Frame::CpuRgb {
            data: vec![0u8; 4 * 4 * 3],
            width: 4,
            height: 4,
            bit_depth: 8,
        };
        let batch = ImageBatch::from_frames(vec![frame.clone(), frame]).unwrap();

        for bad_depth in [0i64, -3, 51, 1000] {
            let inputs = HashMap::from([
                ("images".to_string(), PortData::Images(batch.clone())),
                ("interpolate".to_string(), PortData::Int(bad_depth)),
            ]);
            let err = node.execute(&inputs, &ctx).err().expect("should fail");
            assert!(
                err.to_string().contains("interpolate must be in [1,50]"),
                "unexpected error for depth {bad_depth}: {err}"
            );
        }
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let mut node = FilmInterpolationNode::new();
        let ctx = ExecutionContext::default();

        let frame = Frame::CpuRgb {
            data: vec![0u8; 4 * 4 * 3],
            width: 4,
            height: 4,
            bit_depth: 8,
        };
        let batch = ImageBatch::from_frames(vec![frame.clone(), frame]).unwrap();

        let inputs = HashMap::from([("images".to_string(), PortData::Images(batch))]);
        let err = node.execute(&inputs, &ctx).err().expect("should fail");
        assert_eq!(err.to_string(), "film_model is required");
    }
}
