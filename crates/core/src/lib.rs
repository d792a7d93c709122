//! Document store and loading pipeline.
//!
//! [`store::DocumentStore`] owns the canonical session state and every
//! mutation that must keep page metadata and the underlying PDF bytes
//! consistent. [`loader`] turns uploaded bytes into a [`doc_model::Document`].

pub mod loader;
pub mod store;

pub use loader::{detect_cover_candidates, load_document, LoadError, LoaderConfig};
pub use store::{
    DocumentStore, MutationOutcome, Revision, SkipReason, StoreError, StoreEvent, StoreWarning,
    SubscriptionId,
};
