//! Payment submission state machine and the "my payments" read-through cache.
//!
//! The client only ever moves a payment from draft to submitted. Verification
//! and rejection happen on the server and are observed through `list_mine`.
use serde::Serialize;

use super::api::{PageQuery, PaymentsApi, SubmitForm};
use super::model::{Payment, PaymentDraft, PaymentStatus, StatusCounts};
use super::validate::{self, ValidatedAttachment};
use crate::error::{PaymentError, ValidationError};
use crate::session::{FetchTicket, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SubmissionState {
    Draft,
    Submitting,
    #[serde(rename_all = "camelCase")]
    Submitted {
        payment_id: String,
        status: PaymentStatus,
    },
    #[serde(rename_all = "camelCase")]
    SubmissionFailed { code: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub message: String,
    pub uploaded_file: Option<String>,
}

/// Every payment the identity owns, as of the last refresh.
#[derive(Debug, Clone)]
struct CachedSet {
    owner_id: String,
    payments: Vec<Payment>,
}

/// Upper bound on `my-payments` pages walked by one refresh.
const MAX_PAGES: u32 = 500;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentListing {
    pub payments: Vec<Payment>,
    pub status: Option<PaymentStatus>,
    /// Size of the filtered projection, not of the whole set.
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// The session moved on while the request was in flight.
    Discarded,
}

pub struct PaymentManager {
    state: SubmissionState,
    attachment: Option<ValidatedAttachment>,
    cache: Option<CachedSet>,
    page_limit: u32,
}

impl PaymentManager {
    pub fn new(page_limit: u32) -> Self {
        Self {
            state: SubmissionState::Draft,
            attachment: None,
            cache: None,
            page_limit: page_limit.max(1),
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn attachment(&self) -> Option<&ValidatedAttachment> {
        self.attachment.as_ref()
    }

    /// On failure the previously attached file stays attached.
    pub fn attach(
        &mut self,
        path: &std::path::Path,
        mime_hint: Option<&str>,
    ) -> Result<&ValidatedAttachment, ValidationError> {
        let att = validate::inspect_file(path, mime_hint)?;
        tracing::debug!(file = %att.filename, bytes = att.size_bytes, "attachment accepted");
        let att = self.attachment.insert(att);
        Ok(&*att)
    }

    pub fn detach(&mut self) {
        self.attachment = None;
    }

    /// Drops everything tied to the signed-in identity.
    pub fn reset(&mut self) {
        self.state = SubmissionState::Draft;
        self.attachment = None;
        self.cache = None;
    }

    pub fn submit(
        &mut self,
        session: &SessionStore,
        api: &dyn PaymentsApi,
        draft: &PaymentDraft,
    ) -> Result<SubmitReceipt, PaymentError> {
        if !session.is_authenticated() {
            return Err(PaymentError::Unauthenticated);
        }
        if self.state == SubmissionState::Submitting {
            return Err(PaymentError::Busy);
        }
        let valid = validate::validate_draft(draft)?;
        let slip = match self.attachment.as_ref() {
            Some(att) => Some((att, validate::load_attachment(att)?)),
            None => None,
        };

        let ticket = session.ticket(false);
        self.state = SubmissionState::Submitting;
        tracing::debug!(amount = %valid.amount, method = valid.method.as_str(), "submitting payment");
        let result = api.create_payment(SubmitForm {
            draft: &valid,
            slip,
        });

        match result {
            Ok(created) => {
                let receipt = SubmitReceipt {
                    payment_id: created.data.payment_id,
                    status: created.data.status,
                    message: created.message,
                    uploaded_file: created.data.uploaded_file,
                };
                if session.is_current(&ticket) {
                    self.state = SubmissionState::Submitted {
                        payment_id: receipt.payment_id.clone(),
                        status: receipt.status,
                    };
                    self.attachment = None;
                }
                // The new payment must show up on the next listing.
                self.cache = None;
                tracing::info!(payment = %receipt.payment_id, "payment submitted");
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(error = %e, "payment submission failed");
                self.state = SubmissionState::SubmissionFailed {
                    code: e.code().to_string(),
                    message: e.to_string(),
                };
                Err(PaymentError::Api(e))
            }
        }
    }

    fn cached_for(&self, owner_id: &str) -> Option<&CachedSet> {
        self.cache.as_ref().filter(|c| c.owner_id == owner_id)
    }

    /// Stores a fetched set unless `ticket` went stale while it was in
    /// flight.
    pub fn apply_fetch(
        &mut self,
        session: &SessionStore,
        ticket: FetchTicket,
        payments: Vec<Payment>,
    ) -> RefreshOutcome {
        let Some(identity) = session.identity() else {
            return RefreshOutcome::Discarded;
        };
        if !session.is_current(&ticket) {
            tracing::debug!("discarding stale payments response");
            return RefreshOutcome::Discarded;
        }
        self.cache = Some(CachedSet {
            owner_id: identity.id.clone(),
            payments,
        });
        RefreshOutcome::Applied
    }

    /// Walks `my-payments` page by page until the server's total is reached,
    /// so filters always see the full set.
    pub fn refresh(
        &mut self,
        session: &SessionStore,
        api: &dyn PaymentsApi,
    ) -> Result<RefreshOutcome, PaymentError> {
        if !session.is_authenticated() {
            return Err(PaymentError::Unauthenticated);
        }
        let ticket = session.ticket(false);
        let mut collected: Vec<Payment> = Vec::new();
        let mut page = 1;
        loop {
            let fetched = api
                .my_payments(PageQuery {
                    page,
                    limit: self.page_limit,
                })
                .map_err(|e| {
                    tracing::warn!(error = %e, page, "loading payments failed");
                    PaymentError::Api(e)
                })?;
            let received = fetched.data.len();
            collected.extend(fetched.data);
            let last = received == 0
                || received < self.page_limit as usize
                || collected.len() as u64 >= fetched.total
                || fetched.total_pages.map(|n| page >= n).unwrap_or(false);
            if last {
                break;
            }
            if page >= MAX_PAGES {
                tracing::warn!(pages = page, loaded = collected.len(), "payments listing truncated");
                break;
            }
            page += 1;
        }
        tracing::debug!(pages = page, loaded = collected.len(), "payments loaded");
        Ok(self.apply_fetch(session, ticket, collected))
    }

    /// Status filter and page are projections over the cached set; the
    /// network is used only when nothing is cached for this identity, or
    /// when `force_refresh` is set.
    pub fn list_mine(
        &mut self,
        session: &SessionStore,
        api: &dyn PaymentsApi,
        filter: Option<PaymentStatus>,
        page: Option<u32>,
        force_refresh: bool,
    ) -> Result<PaymentListing, PaymentError> {
        let Some(identity) = session.identity() else {
            return Err(PaymentError::Unauthenticated);
        };
        let owner_id = identity.id.clone();
        if (force_refresh || self.cached_for(&owner_id).is_none())
            && self.refresh(session, api)? == RefreshOutcome::Discarded
        {
            return Err(PaymentError::Superseded);
        }
        self.project(&owner_id, filter, page.unwrap_or(1))
            .ok_or(PaymentError::Superseded)
    }

    fn project(
        &self,
        owner_id: &str,
        filter: Option<PaymentStatus>,
        page: u32,
    ) -> Option<PaymentListing> {
        let cache = self.cached_for(owner_id)?;
        let matching: Vec<&Payment> = cache
            .payments
            .iter()
            .filter(|p| filter.map(|s| p.status == s).unwrap_or(true))
            .collect();
        let total = matching.len() as u64;
        let limit = self.page_limit;
        let page = page.max(1);
        let skip = (page as usize - 1).saturating_mul(limit as usize);
        let payments = matching
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .cloned()
            .collect();
        Some(PaymentListing {
            payments,
            status: filter,
            total,
            page,
            limit,
            total_pages: total.div_ceil(u64::from(limit)) as u32,
            counts: StatusCounts::tally(&cache.payments),
        })
    }

    pub fn counts(&self, session: &SessionStore) -> Option<StatusCounts> {
        let identity = session.identity()?;
        self.cached_for(&identity.id)
            .map(|c| StatusCounts::tally(&c.payments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::error::ApiError;
    use crate::payments::model::{Amount, CreatedPayment, CreatedPaymentData, PaymentMethod, PaymentPage};
    use crate::payments::validate::tests::{draft, temp_dir};
    use crate::session::tests::{identity, scope_ref};
    use crate::session::ScopeLevel;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeApi {
        stored: RefCell<Vec<Payment>>,
        creates: Cell<usize>,
        lists: Cell<usize>,
        fail_next: Cell<Option<ApiError>>,
        last_fields: RefCell<Vec<(&'static str, String)>>,
        last_slip: RefCell<Option<Vec<u8>>>,
    }

    impl FakeApi {
        fn seed(&self, id: &str, status: PaymentStatus) {
            self.stored.borrow_mut().push(Payment {
                id: id.to_string(),
                owner_id: Some("u-student".into()),
                amount: Amount::from_cents(1000),
                method: PaymentMethod::CashDeposit,
                reference: None,
                date: "2024-04-01".into(),
                month: "2024-04".into(),
                notes: None,
                payment_slip_url: None,
                payment_slip_filename: None,
                status,
                rejection_reason: (status == PaymentStatus::Rejected).then(|| "unreadable".into()),
                verified_by: None,
                verified_at: None,
                created_at: None,
                updated_at: None,
            });
        }

        fn calls(&self) -> usize {
            self.creates.get() + self.lists.get()
        }
    }

    impl PaymentsApi for FakeApi {
        fn create_payment(&self, form: SubmitForm<'_>) -> Result<CreatedPayment, ApiError> {
            self.creates.set(self.creates.get() + 1);
            if let Some(e) = self.fail_next.take() {
                return Err(e);
            }
            *self.last_fields.borrow_mut() = form.text_fields();
            *self.last_slip.borrow_mut() = form.slip.as_ref().map(|(_, b)| b.clone());
            let id = format!("pay-{}", self.stored.borrow().len() + 1);
            self.stored.borrow_mut().push(Payment {
                id: id.clone(),
                owner_id: Some("u-student".into()),
                amount: form.draft.amount,
                method: form.draft.method,
                reference: form.draft.reference.clone(),
                date: form.draft.date.to_string(),
                month: form.draft.month.clone(),
                notes: form.draft.notes.clone(),
                payment_slip_url: None,
                payment_slip_filename: None,
                status: PaymentStatus::Pending,
                rejection_reason: None,
                verified_by: None,
                verified_at: None,
                created_at: None,
                updated_at: None,
            });
            Ok(CreatedPayment {
                success: true,
                message: "Payment submitted".into(),
                data: CreatedPaymentData {
                    payment_id: id,
                    status: PaymentStatus::Pending,
                    uploaded_file: None,
                },
            })
        }

        fn my_payments(&self, query: PageQuery) -> Result<PaymentPage, ApiError> {
            self.lists.set(self.lists.get() + 1);
            if let Some(e) = self.fail_next.take() {
                return Err(e);
            }
            let stored = self.stored.borrow();
            let skip = (query.page as usize - 1) * query.limit as usize;
            Ok(PaymentPage {
                total: stored.len() as u64,
                data: stored
                    .iter()
                    .skip(skip)
                    .take(query.limit as usize)
                    .cloned()
                    .collect(),
                total_pages: None,
            })
        }
    }

    fn student_session() -> SessionStore {
        let mut s = SessionStore::new();
        s.set_identity(identity(Role::Student));
        s
    }

    #[test]
    fn submit_then_list_shows_pending_without_manual_invalidation() {
        let api = FakeApi::default();
        api.seed("old-1", PaymentStatus::Verified);
        let session = student_session();
        let mut m = PaymentManager::new(50);

        let first = m.list_mine(&session, &api, None, None, false).unwrap();
        assert_eq!(first.payments.len(), 1);

        let receipt = m.submit(&session, &api, &draft()).unwrap();
        assert_eq!(receipt.status, PaymentStatus::Pending);
        assert_eq!(
            *m.state(),
            SubmissionState::Submitted {
                payment_id: receipt.payment_id.clone(),
                status: PaymentStatus::Pending
            }
        );

        let after = m.list_mine(&session, &api, None, None, false).unwrap();
        let mine = after
            .payments
            .iter()
            .find(|p| p.id == receipt.payment_id)
            .expect("new payment listed");
        assert_eq!(mine.status, PaymentStatus::Pending);
        assert_eq!(api.lists.get(), 2);
    }

    #[test]
    fn switching_status_filter_does_not_refetch() {
        let api = FakeApi::default();
        api.seed("a", PaymentStatus::Pending);
        api.seed("b", PaymentStatus::Verified);
        api.seed("c", PaymentStatus::Rejected);
        api.seed("d", PaymentStatus::Pending);
        let session = student_session();
        let mut m = PaymentManager::new(50);

        m.list_mine(&session, &api, None, None, false).unwrap();
        let before = api.calls();

        let pending = m
            .list_mine(&session, &api, Some(PaymentStatus::Pending), None, false)
            .unwrap();
        let verified = m
            .list_mine(&session, &api, Some(PaymentStatus::Verified), None, false)
            .unwrap();
        let rejected = m
            .list_mine(&session, &api, Some(PaymentStatus::Rejected), None, false)
            .unwrap();
        assert_eq!(api.calls(), before);

        assert_eq!(pending.payments.len(), 2);
        assert_eq!(verified.payments.len(), 1);
        assert_eq!(rejected.payments.len(), 1);
        assert_eq!(rejected.payments[0].rejection_reason.as_deref(), Some("unreadable"));
        assert_eq!(
            pending.counts,
            StatusCounts {
                pending: 2,
                verified: 1,
                rejected: 1,
                total: 4
            }
        );
        assert_eq!(m.counts(&session), Some(pending.counts));

        m.list_mine(&session, &api, None, None, true).unwrap();
        assert_eq!(api.calls(), before + 1);
    }

    #[test]
    fn filters_see_payments_beyond_the_first_page() {
        let api = FakeApi::default();
        api.seed("a", PaymentStatus::Verified);
        api.seed("b", PaymentStatus::Verified);
        api.seed("c", PaymentStatus::Pending);
        let session = student_session();
        let mut m = PaymentManager::new(2);

        let all = m.list_mine(&session, &api, None, None, false).unwrap();
        assert_eq!(api.lists.get(), 2);
        assert_eq!(all.total, 3);
        assert_eq!(all.total_pages, 2);
        assert_eq!(all.payments.len(), 2);

        let pending = m
            .list_mine(&session, &api, Some(PaymentStatus::Pending), None, false)
            .unwrap();
        assert_eq!(pending.payments.len(), 1);
        assert_eq!(pending.payments[0].id, "c");
        assert_eq!(pending.total, 1);
        assert_eq!(pending.total_pages, 1);
        assert_eq!(
            pending.counts,
            StatusCounts {
                pending: 1,
                verified: 2,
                rejected: 0,
                total: 3
            }
        );

        let second = m.list_mine(&session, &api, None, Some(2), false).unwrap();
        assert_eq!(second.page, 2);
        assert_eq!(second.payments.len(), 1);
        assert_eq!(second.payments[0].id, "c");
        // Paging and filtering are both served from the cached set.
        assert_eq!(api.lists.get(), 2);
    }

    #[test]
    fn zero_amount_is_rejected_before_the_network() {
        let api = FakeApi::default();
        let session = student_session();
        let mut m = PaymentManager::new(50);
        let mut d = draft();
        d.amount = "0".into();

        let err = m.submit(&session, &api, &d).unwrap_err();
        assert!(matches!(err, PaymentError::Validation(ValidationError::Field { field: "amount", .. })));
        assert_eq!(api.calls(), 0);
        assert_eq!(*m.state(), SubmissionState::Draft);
    }

    #[test]
    fn rejected_attachment_keeps_previous_one() {
        let dir = temp_dir("campusd-manager-attach");
        let good = dir.join("slip.pdf");
        std::fs::write(&good, b"%PDF-1.4 fake").unwrap();
        let big = dir.join("big.pdf");
        std::fs::write(&big, vec![0u8; 3 * 1024 * 1024]).unwrap();
        let docx = dir.join("notes.docx");
        std::fs::write(&docx, b"PK").unwrap();

        let mut m = PaymentManager::new(50);
        m.attach(&good, Some("application/pdf")).unwrap();
        assert!(matches!(
            m.attach(&big, None),
            Err(ValidationError::TooLarge { .. })
        ));
        assert!(matches!(
            m.attach(&docx, None),
            Err(ValidationError::UnsupportedType(_))
        ));
        assert_eq!(m.attachment().map(|a| a.filename.as_str()), Some("slip.pdf"));

        let api = FakeApi::default();
        let session = student_session();
        m.submit(&session, &api, &draft()).unwrap();
        assert_eq!(api.last_slip.borrow().as_deref(), Some(&b"%PDF-1.4 fake"[..]));
        assert!(m.attachment().is_none());
    }

    #[test]
    fn network_failure_is_typed_and_retryable() {
        let api = FakeApi::default();
        let session = student_session();
        let mut m = PaymentManager::new(50);
        m.list_mine(&session, &api, None, None, false).unwrap();

        api.fail_next.set(Some(ApiError::Transport("timed out".into())));
        let err = m.submit(&session, &api, &draft()).unwrap_err();
        assert_eq!(err.code(), "network_error");
        assert!(matches!(m.state(), SubmissionState::SubmissionFailed { .. }));
        // Nothing was applied: the cached listing is still there.
        assert!(m.counts(&session).is_some());

        let receipt = m.submit(&session, &api, &draft()).unwrap();
        assert_eq!(receipt.status, PaymentStatus::Pending);
        assert_eq!(api.creates.get(), 2);
    }

    #[test]
    fn duplicate_submissions_are_not_deduplicated() {
        let api = FakeApi::default();
        let session = student_session();
        let mut m = PaymentManager::new(50);
        let a = m.submit(&session, &api, &draft()).unwrap();
        let b = m.submit(&session, &api, &draft()).unwrap();
        assert_ne!(a.payment_id, b.payment_id);
        assert_eq!(api.creates.get(), 2);
    }

    #[test]
    fn submitted_fields_follow_the_wire_contract() {
        let api = FakeApi::default();
        let session = student_session();
        let mut m = PaymentManager::new(50);
        let mut d = draft();
        d.amount = "12.5".into();
        d.reference = None;
        d.notes = Some("April fees".into());
        m.submit(&session, &api, &d).unwrap();
        let fields = api.last_fields.borrow().clone();
        assert_eq!(
            fields,
            vec![
                ("paymentAmount", "12.50".to_string()),
                ("paymentMethod", "BANK_TRANSFER".to_string()),
                ("paymentDate", "2024-05-02".to_string()),
                ("paymentMonth", "2024-05".to_string()),
                ("notes", "April fees".to_string()),
            ]
        );
    }

    #[test]
    fn stale_response_is_discarded_after_identity_change() {
        let api = FakeApi::default();
        api.seed("a", PaymentStatus::Pending);
        let mut session = student_session();
        let mut m = PaymentManager::new(50);

        let ticket = session.ticket(false);
        let page = api.my_payments(PageQuery { page: 1, limit: 50 }).unwrap();
        session.set_identity(identity(Role::Teacher));
        assert_eq!(m.apply_fetch(&session, ticket, page.data), RefreshOutcome::Discarded);
        assert!(m.counts(&session).is_none());
    }

    #[test]
    fn own_payments_survive_scope_changes() {
        let api = FakeApi::default();
        let mut session = student_session();
        let mut m = PaymentManager::new(50);
        let ticket = session.ticket(false);
        let page = api.my_payments(PageQuery { page: 1, limit: 50 }).unwrap();
        session
            .select_scope(ScopeLevel::Institute, scope_ref("i1"))
            .unwrap();
        assert_eq!(m.apply_fetch(&session, ticket, page.data), RefreshOutcome::Applied);
    }

    #[test]
    fn signed_out_cannot_submit_or_list() {
        let api = FakeApi::default();
        let session = SessionStore::new();
        let mut m = PaymentManager::new(50);
        assert_eq!(
            m.submit(&session, &api, &draft()).unwrap_err(),
            PaymentError::Unauthenticated
        );
        assert!(m.list_mine(&session, &api, None, None, false).is_err());
        assert_eq!(api.calls(), 0);
    }
}
