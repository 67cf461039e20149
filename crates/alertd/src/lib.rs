pub mod api;
pub mod watch;

pub use api::{build_router, ApiError, ApiRequest, App, TENANT_HEADER};
