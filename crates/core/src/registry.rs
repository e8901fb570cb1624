use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};

use crate::node::Node;

type NodeFactory =
    dyn Fn(HashMap<String, serde_json::Value>) -> Result<Box<dyn Node>> + Send + Sync;

pub struct NodeRegistry {
    factories: HashMap<String, Box<NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, node_type: &str, factory: F)
    where
        F: Fn(HashMap<String, serde_json::Value>) -> Result<Box<dyn Node>> + Send + Sync + 'static,
    {
        self.factories
            .insert(node_type.to_string(), Box::new(factory));
    }

    pub fn create(
        &self,
        node_type: &str,
        params: HashMap<String, serde_json::Value>,
    ) -> Result<Box<dyn Node>> {
        let factory = self
            .factories
            .get(node_type)
            .ok_or_else(|| anyhow!("unknown node type: {node_type}"))?;

        factory(params)
    }

    pub fn list_node_types(&self) -> Vec<&str> {
        let mut node_types: Vec<&str> = self.factories.keys().map(|v| v.as_str()).collect();
        node_types.sort_unstable();
        node_types
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register the frame-interpolation node set.
///
/// The keys match the host's node-type names so that workflow JSON
/// round-trips cleanly between UI and backend.
pub fn register_all_nodes(registry: &mut NodeRegistry, models_dir: &Path) {
    use crate::nodes::film_interpolation::FilmInterpolationNode;
    use crate::nodes::load_film_model::LoadFilmModelNode;

    let models_dir = models_dir.to_path_buf();
    registry.register("LoadFilmModel", move |_params| {
        Ok(Box::new(LoadFilmModelNode::new(models_dir.clone())))
    });
    registry.register("FilmInterpolation", |_params| {
        Ok(Box::new(FilmInterpolationNode::new()))
    });
}

pub fn build_default_registry(models_dir: &Path) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_all_nodes(&mut registry, models_dir);
    registry
}
