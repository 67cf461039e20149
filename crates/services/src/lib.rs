//! Service interfaces the API core calls on its backing collaborators,
//! plus `StandaloneStore`, an in-memory implementation suitable for tests
//! and single-node deployments.
//!
//! The definitions/alerts/actions services are black boxes from the API's
//! point of view: persistent storage, condition evaluation, and action
//! dispatch live behind these traits. What is NOT a black box is the
//! group-trigger lifecycle: template instantiation, propagation to member
//! triggers, and orphan/unorphan re-binding are implemented here, in
//! `standalone`.

mod error;
pub mod standalone;
mod traits;

pub use error::ServiceError;
pub use standalone::StandaloneStore;
pub use traits::{ActionsService, AlertsService, DefinitionsService};

/// Current wall-clock time as epoch millis, the time base of the wire model.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as i64
}
