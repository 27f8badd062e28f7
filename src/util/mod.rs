//! Utility functions for common operations.
//!
//! - **Endpoint validation**: checks that configured feed and webhook URLs
//!   are absolute http(s) URLs

mod url_validator;

pub use url_validator::{validate_endpoint, EndpointError};
