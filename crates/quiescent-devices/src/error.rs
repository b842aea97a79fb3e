//! Error types for quiescent-devices.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{label}: {parameter} must be {requirement} (got {value})")]
    InvalidParameter {
        label: String,
        parameter: &'static str,
        requirement: &'static str,
        value: f64,
    },
}

impl Error {
    pub(crate) fn invalid(
        label: &str,
        parameter: &'static str,
        requirement: &'static str,
        value: f64,
    ) -> Self {
        Error::InvalidParameter {
            label: label.to_owned(),
            parameter,
            requirement,
            value,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
