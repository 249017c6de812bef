// SPDX-License-Identifier: MIT

//! SnipStash: personal text-snippet manager API
//!
//! Users organize reusable snippets ("shortcuts" that expand to stored
//! content) into folders. The server guarantees that no two shortcuts of one
//! user are equal to or prefixes of one another, so a client-side expansion
//! engine always has an unambiguous match.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use dashmap::DashMap;
use db::MongoStore;
use mongodb::bson::oid::ObjectId;
use services::{GoogleAuthClient, Mailer};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-user advisory locks serializing snippet writes.
///
/// The conflict scan followed by the insert is not atomic at the store;
/// holding the user's lock across both closes the window where two
/// prefix-conflicting creates could each pass the scan.
pub type WriteLocks = Arc<DashMap<ObjectId, Arc<Mutex<()>>>>;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: MongoStore,
    pub mailer: Mailer,
    /// Google sign-in client; `None` when not configured
    pub google: Option<GoogleAuthClient>,
    pub write_locks: WriteLocks,
}
