#![forbid(unsafe_code)]

pub mod page_store;
pub mod templates;
