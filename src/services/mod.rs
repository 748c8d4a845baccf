pub mod document_store;
pub mod generator;
