use thiserror::Error;

#[derive(Debug, Error)]
pub enum QkdError {
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("no key agreement session has been initialized")]
    NotInitialized,

    #[error("ciphertext is not valid base64: {0}")]
    MalformedCiphertext(#[from] base64::DecodeError),

    #[error("shared key is empty")]
    EmptyKey,

    #[error("serialization version mismatch for {context}: expected {expected}, found {found}")]
    VersionMismatch {
        context: &'static str,
        expected: u16,
        found: u16,
    },

    #[error("invalid key encoding: unexpected character {found:?} at position {position}")]
    InvalidKeyEncoding { position: usize, found: char },

    #[error("invalid bit value {0}, expected 0 or 1")]
    InvalidBitValue(u8),

    #[error("key file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("key file serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

impl QkdError {
    /// Errors a caller can clear by running a fresh key agreement.
    pub fn needs_reinitialize(&self) -> bool {
        matches!(self, QkdError::NotInitialized | QkdError::EmptyKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn only_missing_or_empty_key_asks_for_rerun() {
        assert!(QkdError::NotInitialized.needs_reinitialize());
        assert!(QkdError::EmptyKey.needs_reinitialize());

        let malformed = STANDARD.decode("8Q=").unwrap_err();
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let serde = serde_json::from_str::<u8>("x").unwrap_err();
        let others = [
            QkdError::EntropyUnavailable("device gone".into()),
            QkdError::MalformedCiphertext(malformed),
            QkdError::VersionMismatch {
                context: "KeyFile",
                expected: 1,
                found: 2,
            },
            QkdError::InvalidKeyEncoding {
                position: 0,
                found: 'z',
            },
            QkdError::InvalidBitValue(2),
            QkdError::Io(io),
            QkdError::Serde(serde),
        ];
        for err in &others {
            assert!(!err.needs_reinitialize(), "{err}");
        }
    }
}
