//! Character sections and their update status.
//!
//! A section is one slice of remote account data (skills, mails, wallet
//! journal, ...) with its own staleness timeout. The update status records
//! when a section was last refreshed, whether that failed, and the
//! fingerprint of the last payload that was stored.

mod model;
mod repository;
mod status;

pub(crate) use model::doubled;
pub use model::Section;
pub use repository::SectionStatusRepository;
pub use status::SectionStatus;
