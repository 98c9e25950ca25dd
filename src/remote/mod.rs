//! Remote access to the IQ server
//!
//! `transport` performs single HTTP exchanges; `session` layers credentials,
//! retry with exponential backoff and one-shot re-authentication on top.
//! Everything downstream talks to the server through the [`ApiClient`] trait,
//! so tests can substitute a fake.

pub mod session;
pub mod transport;

pub use session::{ApiClient, RemoteSession, RetryPolicy};
pub use transport::{Credentials, ReqwestTransport, Transport};
