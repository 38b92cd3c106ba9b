use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("invalid {field}: {value:?} is not one of {allowed:?}")]
    Validation {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("migration {name} applied out of order: depends on {dependency}, which has not been applied")]
    DependencyOrder { name: String, dependency: String },

    #[error("migration {name} conflicts with the live schema: {reason}")]
    SchemaConflict { name: String, reason: String },

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build the write-time rejection for an out-of-enumeration value.
    pub fn validation(field: &str, value: &str, allowed: &[&str]) -> Self {
        Error::Validation {
            field: field.to_string(),
            value: value.to_string(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }
}
