use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Please make sure that this file exists locally? '{}'", .path.display())]
    MissingFile { path: PathBuf },

    #[error("Please make sure {environment} configuration exists within this file? '{source_name}'")]
    MissingEnvironment {
        environment: String,
        source_name: String,
    },

    #[error("Please make sure a `{field}` is configured in {source_name}{hint}")]
    MissingField {
        field: String,
        source_name: String,
        hint: String,
    },

    #[error("Unsupported database adapter '{adapter}'. Please make sure that the database adapter is either mysql2 or postgresql?")]
    UnsupportedAdapter { adapter: String },

    #[error("Local database uses {local} but the server uses {remote}; a dump from one cannot be restored into the other")]
    AdapterMismatch { local: String, remote: String },

    #[error("Malformed connection string: {0}")]
    MalformedConnectionString(String),

    #[error("Failed to read {what} from the server: {detail}")]
    RemoteFetch { what: String, detail: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Failed to parse {source_name}: {source}")]
    Parse {
        source_name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{tool} executable not found in PATH. Please ensure it is installed and in your PATH.")]
    MissingTool {
        tool: String,
        #[source]
        source: which::Error,
    },

    #[error("{stage} command exited with {}: {command}{}", describe_code(.code), describe_stderr(.stderr))]
    Execution {
        stage: String,
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\nStderr: {}", trimmed)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
