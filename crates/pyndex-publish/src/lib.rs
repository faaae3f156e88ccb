//! pyndex-publish: Upload and delete workflows for a package index
//!
//! Each directory's index is updated as a read-modify-write inside that
//! directory's lock; the root index is rebuilt or trimmed under its own
//! lock. Directories are independent: a failure in one leaves directories
//! already processed as they are.

pub mod delete;
pub mod distribution;
pub mod error;
pub mod publisher;
pub mod unlock;
pub mod upload;

pub use delete::DeleteSummary;
pub use distribution::{Distribution, parse_distribution, parse_filename};
pub use error::PublishError;
pub use publisher::{PublishConfig, Publisher};
pub use unlock::force_unlock;
pub use upload::UploadSummary;
