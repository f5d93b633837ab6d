use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "changeme",
];

#[derive(Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub admin: Option<AdminSeed>,
}

/// First admin account, created on startup if the email is not registered.
#[derive(Debug)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = var("LAUNDERLY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("LAUNDERLY_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let host = var("LAUNDERLY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("LAUNDERLY_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("LAUNDERLY_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let db_path: PathBuf = var("LAUNDERLY_DB_PATH").unwrap_or_else(|| "launderly.db".into()).into();

        let token_ttl_hours: i64 = match var("LAUNDERLY_TOKEN_TTL_HOURS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|h| *h > 0)
                .context("LAUNDERLY_TOKEN_TTL_HOURS must be a positive number of hours")?,
            None => 720, // 30 days
        };

        let admin = match (var("LAUNDERLY_ADMIN_EMAIL"), var("LAUNDERLY_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.trim().is_empty() => {
                if password.len() < 8 {
                    bail!("LAUNDERLY_ADMIN_PASSWORD must be at least 8 characters");
                }
                Some(AdminSeed {
                    email: email.trim().to_lowercase(),
                    password,
                })
            }
            _ => None,
        };

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            token_ttl_hours,
            admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("LAUNDERLY_JWT_SECRET", "s3cret-for-tests")]).unwrap();
        assert_eq!(cfg.addr.port(), 3000);
        assert_eq!(cfg.db_path, PathBuf::from("launderly.db"));
        assert_eq!(cfg.token_ttl_hours, 720);
        assert!(cfg.admin.is_none());
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        assert!(config(&[]).is_err());
        assert!(config(&[("LAUNDERLY_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let secret = ("LAUNDERLY_JWT_SECRET", "s3cret-for-tests");
        assert!(config(&[secret, ("LAUNDERLY_PORT", "http")]).is_err());
        assert!(config(&[secret, ("LAUNDERLY_TOKEN_TTL_HOURS", "0")]).is_err());
    }

    #[test]
    fn admin_seed_needs_both_values() {
        let secret = ("LAUNDERLY_JWT_SECRET", "s3cret-for-tests");
        let cfg = config(&[secret, ("LAUNDERLY_ADMIN_EMAIL", "root@hostel.edu")]).unwrap();
        assert!(cfg.admin.is_none());

        let cfg = config(&[
            secret,
            ("LAUNDERLY_ADMIN_EMAIL", " Root@Hostel.edu "),
            ("LAUNDERLY_ADMIN_PASSWORD", "longenough"),
        ])
        .unwrap();
        assert_eq!(cfg.admin.unwrap().email, "root@hostel.edu");
    }
}
