//! Incoming-frame validation for the client role (RFC 6455 Sections 5.1, 5.2).

use crate::config::Limits;
use crate::error::{Error, Result};

/// Validates incoming frame headers before the payload is materialized.
///
/// This library only speaks the client role, so the checks are fixed:
/// server-to-client frames must not be masked, RSV bits must be clear (no
/// extension is ever negotiated), and the payload must fit the configured
/// frame limit.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    limits: Limits,
}

impl FrameValidator {
    /// Create a validator with the given limits.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Validate a raw incoming frame header.
    ///
    /// # Errors
    ///
    /// Protocol error when the frame is masked, any RSV bit is set, or the
    /// declared payload exceeds `max_frame_size`.
    pub fn validate_incoming(
        &self,
        masked: bool,
        rsv1: bool,
        rsv2: bool,
        rsv3: bool,
        payload_len: usize,
    ) -> Result<()> {
        if masked {
            return Err(Error::protocol("masked server-to-client frame"));
        }
        if rsv1 || rsv2 || rsv3 {
            return Err(Error::protocol("reserved bits set without extension"));
        }
        if payload_len > self.limits.max_frame_size {
            return Err(Error::protocol(format!(
                "frame payload of {payload_len} bytes exceeds limit of {}",
                self.limits.max_frame_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_server_frame() {
        let validator = FrameValidator::new(Limits::default());
        assert!(validator
            .validate_incoming(false, false, false, false, 1000)
            .is_ok());
    }

    #[test]
    fn test_rejects_masked_server_frame() {
        let validator = FrameValidator::new(Limits::default());
        let result = validator.validate_incoming(true, false, false, false, 10);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_each_rsv_bit() {
        let validator = FrameValidator::new(Limits::default());
        assert!(validator
            .validate_incoming(false, true, false, false, 0)
            .is_err());
        assert!(validator
            .validate_incoming(false, false, true, false, 0)
            .is_err());
        assert!(validator
            .validate_incoming(false, false, false, true, 0)
            .is_err());
    }

    #[test]
    fn test_masking_checked_before_rsv() {
        let validator = FrameValidator::new(Limits::default());
        let err = validator
            .validate_incoming(true, true, false, false, 0)
            .unwrap_err();
        assert_eq!(err, Error::protocol("masked server-to-client frame"));
    }

    #[test]
    fn test_frame_size_limit() {
        let limits = Limits::new(1024, 4096, 16, 4096);
        let validator = FrameValidator::new(limits);

        assert!(validator
            .validate_incoming(false, false, false, false, 1024)
            .is_ok());
        assert!(validator
            .validate_incoming(false, false, false, false, 1025)
            .is_err());
    }

    #[test]
    fn test_zero_length_payload() {
        let validator = FrameValidator::new(Limits::embedded());
        assert!(validator
            .validate_incoming(false, false, false, false, 0)
            .is_ok());
    }
}
