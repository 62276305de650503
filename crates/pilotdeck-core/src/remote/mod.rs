//! Generic remote sections.
//!
//! Most sections are a single authenticated GET whose JSON body is kept as
//! is. [`JsonSection`] implements that, storing payloads in a
//! [`PayloadRepository`].

mod handler;
mod repository;

pub use handler::{JsonSection, endpoint_path};
pub use repository::PayloadRepository;
