//! Node descriptors: static metadata for the registered node types.
//!
//! Descriptors carry the host-facing schema (display names, categories,
//! port types, defaults, integer ranges, choice sets) as plain data for a
//! generic dispatcher or node editor. They are a separate data path from
//! the runtime `Node::input_ports()`/`output_ports()`.

use serde::Serialize;

use crate::film::FilmStyle;
use crate::nodes::film_interpolation::{DEFAULT_DEPTH, MAX_DEPTH, MIN_DEPTH};
use crate::nodes::load_film_model::DEFAULT_STYLE;

#[derive(Debug, Clone, Serialize)]
pub struct NodeDescriptor {
    pub node_type: String,
    pub display_name: String,
    /// "input", "processing", "output", "utility"
    pub category: String,
    pub inputs: Vec<PortDescriptor>,
    pub outputs: Vec<PortDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortDescriptor {
    pub name: String,
    /// "Images", "Model", "Int", "Str", etc.
    pub port_type: String,
    pub required: bool,
    pub default_value: Option<serde_json::Value>,
    /// Inclusive range bounds for Int ports.
    pub min: Option<i64>,
    pub max: Option<i64>,
    /// Closed choice set for Str ports.
    pub enum_options: Option<Vec<String>>,
}

fn port_required(name: &str, port_type: &str) -> PortDescriptor {
    PortDescriptor {
        name: name.to_string(),
        port_type: port_type.to_string(),
        required: true,
        default_value: None,
        min: None,
        max: None,
        enum_options: None,
    }
}

fn port_opt(name: &str, port_type: &str, default: serde_json::Value) -> PortDescriptor {
    PortDescriptor {
        required: false,
        default_value: Some(default),
        ..port_required(name, port_type)
    }
}

/// Returns descriptors for all registered node types.
///
/// Port data is hardcoded to match the runtime `Node` implementations.
pub fn all_node_descriptors() -> Vec<NodeDescriptor> {
    let style_options = FilmStyle::ALL
        .iter()
        .map(|s| s.dir_name().to_string())
        .collect();

    vec![
        NodeDescriptor {
            node_type: "LoadFilmModel".to_string(),
            display_name: "Load FILM Model".to_string(),
            category: "frame interpolation".to_string(),
            inputs: vec![PortDescriptor {
                enum_options: Some(style_options),
                ..port_opt("film_model", "Str", serde_json::json!(DEFAULT_STYLE))
            }],
            outputs: vec![port_required("film_model", "Model")],
        },
        NodeDescriptor {
            node_type: "FilmInterpolation".to_string(),
            display_name: "FILM Interpolation".to_string(),
            category: "frame interpolation".to_string(),
            inputs: vec![
                port_required("images", "Images"),
                PortDescriptor {
                    min: Some(MIN_DEPTH),
                    max: Some(MAX_DEPTH),
                    ..port_opt("interpolate", "Int", serde_json::json!(DEFAULT_DEPTH))
                },
                port_required("film_model", "Model"),
            ],
            outputs: vec![port_required("images", "Images")],
        },
    ]
}
