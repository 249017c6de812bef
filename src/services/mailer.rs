// SPDX-License-Identifier: MIT

//! Outbound email for password-reset OTP codes.

use crate::config::Config;
use crate::error::AppError;
use anyhow::Context;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP mailer with a log-only fallback.
///
/// When SMTP is not configured (local development, tests) the OTP is written
/// to the log instead of being delivered.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
}

impl Mailer {
    /// Build a mailer from config; returns the log-only mailer when
    /// `SMTP_HOST` is unset.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let Some(host) = config.smtp_host.as_deref() else {
            tracing::warn!("SMTP not configured; OTP codes will be logged, not emailed");
            return Ok(Self {
                transport: None,
                from: None,
            });
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .context("failed building SMTP transport")?;

        if let (Some(username), Some(password)) =
            (config.smtp_username.clone(), config.smtp_password.clone())
        {
            builder = builder.credentials(Credentials::new(username, password));
        }

        let from = config
            .smtp_from
            .as_deref()
            .unwrap_or("no-reply@snipstash.local")
            .parse::<Mailbox>()
            .context("invalid SMTP_FROM address")?;

        Ok(Self {
            transport: Some(builder.build()),
            from: Some(from),
        })
    }

    /// Log-only mailer for tests.
    pub fn new_mock() -> Self {
        Self {
            transport: None,
            from: None,
        }
    }

    /// Send a password-reset OTP to `to`.
    pub async fn send_otp(&self, to: &str, otp: &str) -> Result<(), AppError> {
        let Some(transport) = &self.transport else {
            tracing::info!(to, otp, "OTP (dev mode, not emailed)");
            return Ok(());
        };

        let from = self
            .from
            .clone()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("mailer has no from address")))?;

        let message = Message::builder()
            .from(from)
            .to(to
                .parse::<Mailbox>()
                .map_err(|_| AppError::Validation("Invalid email address".to_string()))?)
            .subject("Your OTP for Password Reset")
            .body(format!("Your OTP is {}. It is valid for 10 minutes.", otp))
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed building email: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed sending email: {}", e)))?;

        tracing::info!(to, "OTP email sent");
        Ok(())
    }
}
