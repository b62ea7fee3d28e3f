use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Absent selects the in-memory backend; present selects Postgres.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Absent selects the log-only mailer.
    pub smtp: Option<SmtpConfig>,
    /// When set, every order confirmation is also copied to this address.
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok();
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let admin_email = env::var("ADMIN_EMAIL").ok();

        // SMTP is configured as a block: SMTP_HOST switches it on, the
        // remaining variables are then required.
        let smtp = match env::var("SMTP_HOST") {
            Ok(smtp_host) => Some(SmtpConfig {
                host: smtp_host,
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(587),
                username: env::var("SMTP_USERNAME").context("SMTP_USERNAME is not set")?,
                password: env::var("SMTP_PASSWORD").context("SMTP_PASSWORD is not set")?,
                from_address: env::var("SMTP_FROM").context("SMTP_FROM is not set")?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            smtp,
            admin_email,
        })
    }
}
