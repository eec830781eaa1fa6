//! Core domain types shared by the agent, retrieval backends, and CLI.

pub mod document;

pub use document::{
    Document, DocumentCorpus, DocumentInput, DocumentRecord, DocumentUpdate, Metadata,
    format_documents, reduce_documents,
};
