//! Order webhook ingestion core: platform adapters, signature validation, the
//! idempotent ingestion processor, the inbound retry queue, and the outbound
//! webhook dispatcher. The HTTP boundary lives in the `gateway` crate; the
//! persistent order store is a collaborator behind [`store::OrderStore`].

pub mod adapters;
pub mod dispatcher;
pub mod error;
pub mod processor;
pub mod retry;
pub mod signature;
pub mod store;

pub use error::{AdapterError, StoreError};
pub use processor::{ApplyOutcome, Outcome, Processor, RejectReason};
