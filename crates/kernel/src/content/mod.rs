//! Content write path: value codec, validation, and CRUD service.

pub mod codec;
mod service;
pub mod validate;

pub use service::{ContentService, CreateContent, DeleteMode, UpdateContent};
