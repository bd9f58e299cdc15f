//! Error types for Cascata

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum CascataError {
    #[error("caused: {0}")]
    IllegalArgument(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("invalid login credentials: {0}")]
    InvalidLoginCredentials(String),

    #[error("identity access error: {0}")]
    IdentityAccess(String),

    #[error("authorizer creation error: {0}")]
    AuthorizerCreation(String),

    #[error("uninheritable authorizations: {0}")]
    UninheritableAuthorizations(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascata_error_display() {
        let err = CascataError::IllegalArgument("invalid param".to_string());
        assert_eq!(format!("{}", err), "caused: invalid param");

        let err = CascataError::IllegalState("already registered".to_string());
        assert_eq!(format!("{}", err), "illegal state: already registered");

        let err = CascataError::InvalidLoginCredentials("bad password".to_string());
        assert_eq!(
            format!("{}", err),
            "invalid login credentials: bad password"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CascataError = io_err.into();
        assert!(matches!(err, CascataError::Io(_)));
    }
}
