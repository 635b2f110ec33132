//! Rust client SDK for the Drillbit REST backend
//!
//! Wraps the Django REST collections (`/{app}/{model}/`) and the
//! statement-generation endpoints used to build project financials.
//!
//! # Example
//!
//! ```rust,no_run
//! use drillbit_client::{ClientConfig, DrillbitClient, Frequency, Pk, ResourceRef, StatementQuery};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DrillbitClient::new(ClientConfig {
//!     base_url: "http://localhost:8000".into(),
//!     ..Default::default()
//! })?;
//!
//! // Fetch an environment record
//! let env: serde_json::Value = client.get(&ResourceRef::ENVIRONMENT, &Pk::Int(7)).await?;
//!
//! // Check whether monthly statements already exist
//! let exists = client
//!     .statement_exists(&StatementQuery::new(7, vec![1, 2], Frequency::Monthly))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod statements;
pub mod types;

// Re-export main types
pub use client::DrillbitClient;
pub use error::{ClientError, Result};
pub use types::*;
