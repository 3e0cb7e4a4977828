use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown parameter: \"{name}\"")]
    UnknownParameter { name: String },

    #[error("Parameter \"{name}\" must be positive, got {value}")]
    NonPositiveParameter { name: String, value: f64 },
}
