use thiserror::Error;

/// An error that occurred while parsing a duration from the manifest or the command line.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("'{0}' is not a valid duration, expected e.g. '30', '30s', '1500ms' or '2m'")]
    Syntax(String),
    #[error("unit '{0}' not supported")]
    UnitNotSupported(String),
}
