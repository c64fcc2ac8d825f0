pub mod logging;

use std::path::PathBuf;
use which::which;

use crate::errors::{AppError, Result};

/// Finds an executable in the system PATH.
pub fn find_executable(tool: &str) -> Result<PathBuf> {
    which(tool).map_err(|source| AppError::MissingTool {
        tool: tool.to_string(),
        source,
    })
}
