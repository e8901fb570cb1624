//! Model-loader node: resolves a FILM style preset to an on-disk model and
//! produces a reusable inference handle on its output port.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::film::{FilmModel, FilmStyle};
use crate::node::{ExecutionContext, Node, PortDefinition};
use crate::types::{PortData, PortType};

pub const DEFAULT_STYLE: &str = "Style";

pub struct LoadFilmModelNode {
    models_dir: PathBuf,
}

impl LoadFilmModelNode {
    pub fn new(models_dir: PathBuf) -> Self {
        Self { models_dir }
    }
}

impl Node for LoadFilmModelNode {
    fn node_type(&self) -> &str {
        "LoadFilmModel"
    }

    fn input_ports(&self) -> Vec<PortDefinition> {
        vec![PortDefinition {
            name: "film_model".to_string(),
            port_type: PortType::Str,
            required: false,
            default_value: Some(serde_json::json!(DEFAULT_STYLE)),
        }]
    }

    fn output_ports(&self) -> Vec<PortDefinition> {
        vec![PortDefinition {
            name: "film_model".to_string(),
            port_type: PortType::Model,
            required: true,
            default_value: None,
        }]
    }

    fn execute(
        &mut self,
        inputs: &HashMap<String, PortData>,
        _ctx: &ExecutionContext,
    ) -> Result<HashMap<String, PortData>> {
        let style = match inputs.get("film_model") {
            Some(PortData::Str(s)) => FilmStyle::parse(s)?,
            Some(_) => bail!("film_model must be a Str"),
            None => FilmStyle::parse(DEFAULT_STYLE)?,
        };

        let model = FilmModel::load(&self.models_dir, style)?;

        Ok(HashMap::from([(
            "film_model".to_string(),
            PortData::Model(Arc::new(model)),
        )]))
    }
}
