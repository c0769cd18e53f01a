#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("config: {0}")]
    Config(String),

    #[error("plugin: {0}")]
    Plugin(#[from] rivulet_api::PluginError),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("input line {line}: {detail}")]
    Input { line: usize, detail: String },

    #[error("io: {0}")]
    Stream(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
