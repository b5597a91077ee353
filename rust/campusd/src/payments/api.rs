use super::model::{CreatedPayment, PaymentPage};
use super::validate::{ValidDraft, ValidatedAttachment};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub limit: u32,
}

/// Multipart body of `POST /payment`.
pub struct SubmitForm<'a> {
    pub draft: &'a ValidDraft,
    pub slip: Option<(&'a ValidatedAttachment, Vec<u8>)>,
}

impl SubmitForm<'_> {
    /// Text fields in wire order; optional ones only when present.
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        let d = self.draft;
        let mut fields = vec![
            ("paymentAmount", d.amount.to_string()),
            ("paymentMethod", d.method.as_str().to_string()),
            ("paymentDate", d.date.format("%Y-%m-%d").to_string()),
            ("paymentMonth", d.month.clone()),
        ];
        if let Some(r) = &d.reference {
            fields.push(("paymentReference", r.clone()));
        }
        if let Some(n) = &d.notes {
            fields.push(("notes", n.clone()));
        }
        fields
    }
}

/// Server endpoints the payment lifecycle reads and writes.
pub trait PaymentsApi {
    fn create_payment(&self, form: SubmitForm<'_>) -> Result<CreatedPayment, ApiError>;
    fn my_payments(&self, query: PageQuery) -> Result<PaymentPage, ApiError>;
}
