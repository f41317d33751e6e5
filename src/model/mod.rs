//! Graph model building

mod builder;
mod elements;
mod graph_model;
mod insights;

pub use builder::{build_graph_model, ModelInputs};
pub use elements::*;
pub use graph_model::GraphModel;
pub use insights::generate_performance_insights;
