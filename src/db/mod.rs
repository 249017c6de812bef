//! Database layer (MongoDB).

pub mod mongo;

pub use mongo::{MongoStore, SnippetPage};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const FOLDERS: &str = "folders";
    pub const SNIPPETS: &str = "snippets";
}
