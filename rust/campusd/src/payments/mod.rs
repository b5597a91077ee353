pub mod api;
pub mod manager;
pub mod model;
pub mod validate;

pub use api::{PageQuery, PaymentsApi, SubmitForm};
pub use manager::{PaymentListing, PaymentManager, RefreshOutcome, SubmissionState, SubmitReceipt};
pub use model::{Payment, PaymentDraft, PaymentStatus, StatusCounts};
