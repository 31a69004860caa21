//! # Convergent
//!
//! Testing support for eventually-consistent HTTP services: a bounded polling
//! executor, immutable request descriptors, and point-in-time verification.
//!
//! ```no_run
//! use convergent::{verify, PollConfig, Poller, RequestDescriptor, Session, Settings};
//! use std::time::Duration;
//!
//! # async fn scenario() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::new()?;
//! let session = Session::http(&settings.transport)?;
//! let me = RequestDescriptor::get("https://qa.example.com/api/User/me").with_bearer("token");
//!
//! let result = Poller::new(|| session.send(&me), |r: &convergent::ResponseDescriptor| r.is_success())
//!     .with_config(PollConfig::new(Duration::from_secs(1), Duration::from_secs(10))?)
//!     .result()
//!     .await?;
//! verify(result.value().status()).labeled("profile readable").is(200u16)?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod data;
pub mod environment;
pub mod error;
pub mod poller;
pub mod probe;
pub mod request;
pub mod response;
pub mod settings;
pub mod transport;
pub mod verify;

#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

pub use auth::{AccessToken, Authorization, EnvTokenSource, TokenSource};
pub use data::{DataSet, DataSources};
pub use environment::Environment;
pub use error::{HarnessError, Result};
pub use poller::{PollConfig, PollOutcome, PollResult, Poller};
pub use probe::{probe, Expectation, ProbeReport};
pub use request::{Body, Method, RequestDescriptor, SerializationFormat};
pub use response::{ResponseDescriptor, StatusCode};
pub use settings::Settings;
pub use transport::{HttpTransport, Session, Transport};
pub use verify::{verify, verify_labeled, verify_that, Closeness, VerificationFailure, Verify};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
