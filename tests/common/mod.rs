// SPDX-License-Identifier: MIT

use snipstash::config::Config;
use snipstash::db::MongoStore;
use snipstash::middleware::auth::create_jwt;
use snipstash::routes::create_router;
use snipstash::services::Mailer;
use snipstash::AppState;
use std::sync::Arc;

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> MongoStore {
    MongoStore::new_mock()
}

/// Create a test JWT for the given user id.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: mongodb::bson::oid::ObjectId, signing_key: &[u8]) -> String {
    create_jwt(user_id, signing_key).expect("JWT creation should succeed")
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();
    let mailer = Mailer::new_mock();
    let write_locks = Arc::new(dashmap::DashMap::new());

    let state = Arc::new(AppState {
        config,
        db,
        mailer,
        google: None,
        write_locks,
    });

    (create_router(state.clone()), state)
}
