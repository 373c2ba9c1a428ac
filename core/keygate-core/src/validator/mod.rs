//! Remote Validator
//!
//! One classifying request per call: does this credential still authenticate?
//!
//! ```text
//! Ok(Valid)        → credential accepted
//! Ok(Invalid)      → rejected, or nothing to check
//! Ok(Expired)      → rejected, and the service said why
//! Err(Transport)   → could not get an answer (retry, don't reconfigure)
//! ```
//!
//! Validators have no side effects beyond the request itself, so a result
//! nobody is waiting for can simply be dropped.

mod http;

pub use http::HttpValidator;

use crate::error::GateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid,
    Expired,
}

impl Validation {
    pub fn is_valid(self) -> bool {
        matches!(self, Validation::Valid)
    }

    /// Rejections as a typed error, for callers that propagate with `?`.
    pub fn into_result(self) -> Result<(), GateError> {
        match self {
            Validation::Valid => Ok(()),
            Validation::Invalid => Err(GateError::Rejected { expired: false }),
            Validation::Expired => Err(GateError::Rejected { expired: true }),
        }
    }
}

pub trait RemoteValidator: Send + Sync {
    /// Classifies `secret`. Only transport-kind errors are expected in `Err`.
    fn validate(&self, secret: &str) -> Result<Validation, GateError>;
}

impl<V: RemoteValidator + ?Sized> RemoteValidator for std::sync::Arc<V> {
    fn validate(&self, secret: &str) -> Result<Validation, GateError> {
        (**self).validate(secret)
    }
}

impl<V: RemoteValidator + ?Sized> RemoteValidator for Box<V> {
    fn validate(&self, secret: &str) -> Result<Validation, GateError> {
        (**self).validate(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn rejections_map_to_rejected_kind() {
        assert!(Validation::Valid.into_result().is_ok());
        let err = Validation::Expired.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert!(matches!(err, GateError::Rejected { expired: true }));
        assert!(matches!(
            Validation::Invalid.into_result(),
            Err(GateError::Rejected { expired: false })
        ));
    }
}
