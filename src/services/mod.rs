//! Domain services.

pub mod conflict;
pub mod google;
pub mod mailer;

pub use google::GoogleAuthClient;
pub use mailer::Mailer;
