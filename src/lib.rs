pub mod clock;
pub mod config;
pub mod document;
pub mod error;
pub mod model;
pub mod query;
pub mod store;
pub mod submission;
pub mod utils;
pub mod workflow;

pub use document::Document;
pub use error::{AuthorizationError, ValidationError, WorkflowError, WorkflowResult};
pub use store::{DocumentStore, Snapshot, StoreEvent, SubscriptionId};
pub use submission::Submission;
