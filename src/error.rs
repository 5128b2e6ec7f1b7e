/// The registry's single error type.
///
/// Every variant carries the wire `error_code` from §6's dictionary so the HTTP
/// layer can serialize `{"error_code": .., "message": ..}` without re-deriving it.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[cfg(feature = "avro")]
    #[error(transparent)]
    Avro(#[from] avro_rs::Error),

    #[error("invalid context name: {0}")]
    InvalidContextName(String),

    #[error("subject not found: {0}")]
    SubjectNotFound(String),

    #[error("version not found: {subject}/{version}")]
    VersionNotFound { subject: String, version: i32 },

    #[error("schema not found: {0}")]
    SchemaNotFound(String),

    #[error("subject is not soft-deleted: {0}")]
    SubjectNotSoftDeleted(String),

    #[error("version is not soft-deleted: {subject}/{version}")]
    VersionNotSoftDeleted { subject: String, version: i32 },

    #[error("compatibility is not configured for subject: {0}")]
    SubjectCompatibilityNotConfigured(String),

    #[error("exporter not found: {0}")]
    ExporterNotFound(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid version number: {0}")]
    InvalidVersion(String),

    #[error("invalid compatibility level: {0}")]
    InvalidCompatibilityLevel(String),

    #[error("invalid mode: {0}")]
    InvalidMode(String),

    #[error("operation not permitted in current mode: {0}")]
    OperationNotPermitted(String),

    #[error("reference integrity violation: {0}")]
    ReferenceIntegrityViolation(String),

    #[error("exporter name conflict: {0}")]
    ExporterNameConflict(String),

    #[error("incompatible schema: {0:?}")]
    IncompatibleSchema(Vec<String>),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    PlainNotFound(String),
}

impl RegistryError {
    /// The `error_code` to place on the wire, per §6.
    pub fn error_code(&self) -> i32 {
        match self {
            #[cfg(feature = "avro")]
            Self::Avro(_) => 42201,
            Self::InvalidContextName(_) => 42201,
            Self::SubjectNotFound(_) => 40401,
            Self::VersionNotFound { .. } => 40402,
            Self::SchemaNotFound(_) => 40403,
            Self::SubjectNotSoftDeleted(_) => 40405,
            Self::VersionNotSoftDeleted { .. } => 40407,
            Self::SubjectCompatibilityNotConfigured(_) => 40408,
            Self::ExporterNotFound(_) => 40450,
            Self::InvalidSchema(_) => 42201,
            Self::InvalidVersion(_) => 42202,
            Self::InvalidCompatibilityLevel(_) => 42203,
            Self::InvalidMode(_) => 42204,
            Self::OperationNotPermitted(_) => 42205,
            Self::ReferenceIntegrityViolation(_) => 42206,
            Self::ExporterNameConflict(_) => 40950,
            Self::IncompatibleSchema(_) => 409,
            Self::Storage(_) => 500,
            Self::PlainNotFound(_) => 404,
        }
    }

    /// The HTTP status class this error maps to.
    pub fn http_status(&self) -> u16 {
        match self.error_code() {
            409 | 40950 => 409,
            500 => 500,
            404 => 404,
            code => (code / 100) as u16,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
