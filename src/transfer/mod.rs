//! Cross-domain skill transfer: compatibility, learning paths, journeys

pub mod compatibility;
pub mod journey;
pub mod path;

pub use compatibility::TransferEngine;
pub use journey::{JourneyBook, UserHistory};
pub use path::{path_summary, PathGenerator};
