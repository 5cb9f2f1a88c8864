//! Utility functions for common operations.
//!
//! - **URL validation**: endpoint and link checks before any request or
//!   browser launch
//! - **Task helpers**: panic capture for spawned background work

mod task;
mod url_validator;

pub use task::catch_task_panic;
pub use url_validator::{validate_endpoint, validate_url_for_open, UrlValidationError};
