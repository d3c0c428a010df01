pub mod clock;
pub mod error;
pub mod types;
pub mod validation;

pub use clock::{Clock, Deadline, FixedClock, MonotonicClock, SystemClock};
pub use error::{CoreError, Result};
pub use types::{
    AuditRecord, AuthorizationRequest, CallbackReceipt, DecisionOutcome, DecisionPayload,
    INVALID_CALLBACK_URL,
};
pub use validation::{validate_callback_url, validate_driver_token};
