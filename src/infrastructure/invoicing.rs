//! Fallback InvoiceProvider used when no invoicing backend is wired in.
//!
//! Every request fails as unavailable, so invoices are recorded as `Failed`
//! and picked up by the retry sweep once a real provider is configured.

use async_trait::async_trait;
use log::warn;

use crate::application::ports::{InvoiceError, InvoiceProvider, InvoiceRequest, IssuedInvoice};

#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredInvoiceProvider;

#[async_trait]
impl InvoiceProvider for UnconfiguredInvoiceProvider {
    async fn issue(&self, request: InvoiceRequest) -> Result<IssuedInvoice, InvoiceError> {
        warn!("No invoice provider configured; cannot invoice {}", request.target);
        Err(InvoiceError::Unavailable(
            "no invoice provider configured".to_string(),
        ))
    }

    async fn void(&self, invoice_number: &str, _reason: &str) -> Result<(), InvoiceError> {
        warn!("No invoice provider configured; cannot void {}", invoice_number);
        Err(InvoiceError::Unavailable(
            "no invoice provider configured".to_string(),
        ))
    }
}
