//! quirk — client library for a document → embedding → ChromaDB pipeline.
//!
//! Stage local files, submit them as one batch embedding job, poll the job
//! to completion on a bounded schedule, then export the embeddings to disk,
//! push them into ChromaDB, or run similarity search against the collection.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod mode;
pub mod pipeline;
pub mod progress;
pub mod search;
pub mod shell;
pub mod staging;
pub mod store;
