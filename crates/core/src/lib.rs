//! Core crate for FILM frame-interpolation nodes.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod film;
pub mod interpolate;
pub mod logging;
pub mod node;
pub mod nodes;
pub mod registry;
pub mod types;
