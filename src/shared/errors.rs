use std::fmt;

use thiserror::Error;

/// Why a package could not be claimed by a shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    NotFound,
    NotOwned,
    /// Package is not `Arrived` (carries the current status name)
    NotArrived(String),
    /// Package already belongs to another shipment
    AlreadyInShipment(i32),
    /// Package changed (re-measured or claimed) after it was priced
    Changed,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::NotOwned => write!(f, "owned by another customer"),
            Self::NotArrived(status) => write!(f, "not arrived (status {})", status),
            Self::AlreadyInShipment(id) => write!(f, "already in shipment {}", id),
            Self::Changed => write!(f, "changed since it was priced"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailablePackage {
    pub package_id: i32,
    pub reason: UnavailableReason,
}

fn describe(packages: &[UnavailablePackage]) -> String {
    packages
        .iter()
        .map(|p| format!("#{} {}", p.package_id, p.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    InvalidState,
    NotFound,
    External,
    Storage,
}

#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Tracking number already exists: {0}")]
    DuplicateTrackingNumber(String),

    #[error("Packages unavailable: {}", describe(.0))]
    PackageUnavailable(Vec<UnavailablePackage>),

    #[error("Transaction {transaction_id} already reviewed (status {status})")]
    AlreadyReviewed { transaction_id: i32, status: String },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Cannot {operation} {entity} {id} in status {status}")]
    InvalidState {
        entity: &'static str,
        id: i32,
        status: String,
        operation: &'static str,
    },

    #[error("Shipment {0} has an issued invoice; void it before cancelling")]
    InvoiceOutstanding(i32),

    #[error("External collaborator error: {0}")]
    External(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::DuplicateTrackingNumber(_)
            | Self::PackageUnavailable(_)
            | Self::AlreadyReviewed { .. }
            | Self::InsufficientBalance { .. } => ErrorKind::Conflict,
            Self::InvalidState { .. } | Self::InvoiceOutstanding(_) => ErrorKind::InvalidState,
            Self::External(_) => ErrorKind::External,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether this error is likely transient and the operation may succeed
    /// if retried unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::External | ErrorKind::Storage)
    }

    pub(crate) fn not_found(entity: &'static str, id: i32) -> Self {
        Self::NotFound {
            entity,
            field: "id",
            value: id.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            DomainError::DuplicateTrackingNumber("TN1".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(DomainError::InvoiceOutstanding(3).kind(), ErrorKind::InvalidState);
        assert_eq!(DomainError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert!(DomainError::Storage("locked".into()).is_transient());
        assert!(!DomainError::not_found("Package", 1).is_transient());
    }

    #[test]
    fn unavailable_message_names_each_package() {
        let err = DomainError::PackageUnavailable(vec![
            UnavailablePackage {
                package_id: 4,
                reason: UnavailableReason::AlreadyInShipment(9),
            },
            UnavailablePackage {
                package_id: 7,
                reason: UnavailableReason::NotArrived("Pending".into()),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Packages unavailable: #4 already in shipment 9, #7 not arrived (status Pending)"
        );
    }
}
