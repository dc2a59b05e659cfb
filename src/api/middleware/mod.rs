//! API middleware

mod logging;

pub use logging::{RequestLogging, REQUEST_ID_HEADER};
