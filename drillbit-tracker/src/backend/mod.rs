//! Backend abstraction layer.
//!
//! The aggregates and the statement tracker talk to the Drillbit REST API
//! only through these traits:
//! - `HttpBackend` over `drillbit-client` for real use
//! - `MockBackend` for tests and dry runs

pub mod http;
pub mod mock;
pub mod traits;

pub use http::HttpBackend;
pub use mock::MockBackend;
pub use traits::{ActionMethod, BackendError, ObjectBackend, StatementBackend};
