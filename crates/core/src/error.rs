use std::fmt;

/// Error taxonomy shared by every layer. Each [`Error`] and every
/// reconciler diagnostic maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum ErrorKind {
    ClientNotInitialized,
    UnexpectedImportIdentifier,
    MissingDiscriminator,
    UnknownVariant,
    UnsupportedVariant,
    InvalidVariantShape,
    InvalidValue,
    ConstraintViolation,
    VersionConflict,
    ResourceNotFound,
    ResourceNotFoundOnOther,
    EnvironmentNotFound,
    DeleteNotConfirmed,
    Retryable,
    /// A 4xx response that fits none of the specific kinds above.
    Api,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ClientNotInitialized => "ClientNotInitialized",
            ErrorKind::UnexpectedImportIdentifier => "UnexpectedImportIdentifier",
            ErrorKind::MissingDiscriminator => "MissingDiscriminator",
            ErrorKind::UnknownVariant => "UnknownVariant",
            ErrorKind::UnsupportedVariant => "UnsupportedVariant",
            ErrorKind::InvalidVariantShape => "InvalidVariantShape",
            ErrorKind::InvalidValue => "InvalidValue",
            ErrorKind::ConstraintViolation => "ConstraintViolation",
            ErrorKind::VersionConflict => "VersionConflict",
            ErrorKind::ResourceNotFound => "ResourceNotFound",
            ErrorKind::ResourceNotFoundOnOther => "ResourceNotFoundOnOther",
            ErrorKind::EnvironmentNotFound => "EnvironmentNotFound",
            ErrorKind::DeleteNotConfirmed => "DeleteNotConfirmed",
            ErrorKind::Retryable => "Retryable",
            ErrorKind::Api => "Api",
            ErrorKind::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while decoding, encoding or validating value trees.
///
/// None of these touch remote state: a codec failure always leaves the
/// tracked state as it was.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(
        "Invalid import ID specified (\"{id}\").  The ID should be in the format \"{format}\" and must match regex: {regex}"
    )]
    UnexpectedImportIdentifier {
        id: String,
        format: String,
        regex: String,
    },

    /// The discriminator of a union node is Null, Unknown or missing.
    #[error("{family}: discriminator '{field}' is not set")]
    MissingDiscriminator { family: String, field: String },

    /// The plan names a variant the registry does not know.
    #[error("{family}: '{tag}' is not a recognised variant")]
    UnknownVariant { family: String, tag: String },

    /// The server returned a variant the registry does not know.
    #[error("{family}: server returned unsupported variant '{tag}'")]
    UnsupportedVariant { family: String, tag: String },

    /// A field required by the chosen variant is Null or Unknown.
    #[error("{family} ({variant}): required field '{field}' is not set")]
    InvalidVariantShape {
        family: String,
        variant: String,
        field: String,
    },

    /// A value does not fit the type the schema declares for it.
    #[error("{path}: {message}")]
    InvalidValue { path: String, message: String },

    #[error("{path}: {message}")]
    ConstraintViolation { path: String, message: String },

    #[error("shape '{0}' is not registered")]
    UnknownShape(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnexpectedImportIdentifier { .. } => ErrorKind::UnexpectedImportIdentifier,
            Error::MissingDiscriminator { .. } => ErrorKind::MissingDiscriminator,
            Error::UnknownVariant { .. } => ErrorKind::UnknownVariant,
            Error::UnsupportedVariant { .. } => ErrorKind::UnsupportedVariant,
            Error::InvalidVariantShape { .. } => ErrorKind::InvalidVariantShape,
            Error::InvalidValue { .. } | Error::UnknownShape(_) => ErrorKind::InvalidValue,
            Error::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
        }
    }

    pub(crate) fn invalid(path: &str, message: impl Into<String>) -> Self {
        Error::InvalidValue {
            path: display_path(path),
            message: message.into(),
        }
    }
}

/// Paths are built with a leading separator; the root itself prints as `.`.
pub fn display_path(path: &str) -> String {
    if path.is_empty() {
        ".".to_string()
    } else {
        path.trim_start_matches('.').to_string()
    }
}
