//! Model document writing
//!
//! The document is the single durable artifact of a run, consumed by the diagram
//! front end.

use std::path::Path;

use crate::error::LineageError;
use crate::model::GraphModel;

/// Serialize the model to its JSON document form.
pub fn to_json(model: &GraphModel, pretty: bool) -> Result<String, LineageError> {
    let json = if pretty {
        serde_json::to_string_pretty(model)?
    } else {
        serde_json::to_string(model)?
    };
    Ok(json)
}

/// Write the model document to `output_path`, creating parent directories as needed.
pub fn write_model(model: &GraphModel, output_path: &Path, pretty: bool) -> Result<(), LineageError> {
    let json = to_json(model, pretty)?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LineageError::ModelWriteError {
            path: output_path.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::write(output_path, json).map_err(|e| LineageError::ModelWriteError {
        path: output_path.to_path_buf(),
        source: e,
    })
}
