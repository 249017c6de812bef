//! Storage models.

pub mod folder;
pub mod snippet;
pub mod user;

pub use folder::Folder;
pub use snippet::Snippet;
pub use user::{User, UserSettings};
