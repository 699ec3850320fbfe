//! Invoice trigger
//!
//! Decides whether a state transition requires an invoice. The decision is
//! pure; issuing is done by
//! [`InvoiceService`](crate::application::services::InvoiceService).

use super::model::InvoiceRecord;

/// An entity whose transitions may require an invoice.
pub trait Invoiceable {
    type Status: Copy + PartialEq;

    fn invoice(&self) -> &InvoiceRecord;

    /// Business rule for this entity type, ignoring existing invoices.
    fn requires_invoice(&self, previous: Self::Status, next: Self::Status) -> bool;
}

/// Whether moving `entity` from `previous` to `next` must issue an invoice.
///
/// Once an invoice reference exists (or an issuance is in flight) this is
/// always false, so duplicated status updates never issue twice.
pub fn should_issue<E: Invoiceable>(entity: &E, previous: E::Status, next: E::Status) -> bool {
    if entity.invoice().is_taken() {
        return false;
    }
    entity.requires_invoice(previous, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invoice::InvoiceStatus;

    #[derive(Clone, Copy, PartialEq)]
    enum Light {
        Red,
        Green,
    }

    struct Crossing {
        invoice: InvoiceRecord,
    }

    impl Invoiceable for Crossing {
        type Status = Light;

        fn invoice(&self) -> &InvoiceRecord {
            &self.invoice
        }

        fn requires_invoice(&self, previous: Light, next: Light) -> bool {
            previous == Light::Red && next == Light::Green
        }
    }

    #[test]
    fn rule_applies_without_invoice() {
        let c = Crossing {
            invoice: InvoiceRecord::default(),
        };
        assert!(should_issue(&c, Light::Red, Light::Green));
        assert!(!should_issue(&c, Light::Green, Light::Red));
    }

    #[test]
    fn existing_reference_blocks_issue() {
        let c = Crossing {
            invoice: InvoiceRecord {
                status: InvoiceStatus::Voided,
                invoice_ref: Some("INV-1".into()),
                ..InvoiceRecord::default()
            },
        };
        assert!(!should_issue(&c, Light::Red, Light::Green));
    }

    #[test]
    fn in_flight_issue_blocks_issue() {
        let c = Crossing {
            invoice: InvoiceRecord {
                status: InvoiceStatus::Issuing,
                ..InvoiceRecord::default()
            },
        };
        assert!(!should_issue(&c, Light::Red, Light::Green));
    }

    #[test]
    fn failed_attempt_may_issue_again() {
        let c = Crossing {
            invoice: InvoiceRecord {
                status: InvoiceStatus::Failed,
                last_error: Some("timeout".into()),
                ..InvoiceRecord::default()
            },
        };
        assert!(should_issue(&c, Light::Red, Light::Green));
    }
}
