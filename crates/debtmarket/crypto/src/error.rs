use thiserror::Error;

/// Errors from parsing or constructing key material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_error_display() {
        let err = CryptoError::InvalidLength {
            expected: 32,
            actual: 20,
        };
        let s = err.to_string();
        assert!(s.contains("32"));
        assert!(s.contains("20"));
    }
}
