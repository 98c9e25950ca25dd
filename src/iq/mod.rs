//! IQ server resources: applications, report references and raw reports
//!
//! Every component here takes the API client by reference, so the same
//! session is shared across the resolver, locator and retriever.

pub mod fields;
pub mod locator;
pub mod resolver;
pub mod retriever;
pub mod types;

pub use fields::Fields;
pub use locator::{Located, ReportLocator};
pub use resolver::ResourceResolver;
pub use retriever::RawReportRetriever;
pub use types::{Application, Organization, RawReport, ReportReference};
