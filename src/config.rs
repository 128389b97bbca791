use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without one the server runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Shared secret the notifier presents to the send endpoint.
    pub notify_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub base_url: String,
    pub send_url: String,
    pub token_ttl_minutes: i64,
    pub session_ttl_minutes: i64,
    pub reveal_accounts: bool,
    pub log_level: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL").ok();
        let jwt_secret = env_required("JWT_SECRET")?;
        let notify_secret = env_required("PASSGATE_NOTIFY_SECRET")?;

        let host: IpAddr = env_or("PASSGATE_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid PASSGATE_HOST: {e}"))?;

        let port: u16 = env_or("PASSGATE_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid PASSGATE_PORT: {e}"))?;

        let base_url = env_or("PASSGATE_BASE_URL", &format!("http://{host}:{port}"));
        let send_url = env_or("PASSGATE_SEND_URL", &format!("{base_url}/api/send"));

        let token_ttl_minutes = parse_minutes("PASSGATE_TOKEN_TTL_MINUTES", "60")?;
        let session_ttl_minutes = parse_minutes("PASSGATE_SESSION_TTL_MINUTES", "1440")?;

        let reveal_accounts = match env_or("PASSGATE_REVEAL_ACCOUNTS", "false").as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => return Err(format!("Invalid PASSGATE_REVEAL_ACCOUNTS: {other}")),
        };

        let log_level = env_or("PASSGATE_LOG_LEVEL", "info");

        let smtp = match (
            std::env::var("PASSGATE_SMTP_HOST").ok(),
            std::env::var("PASSGATE_SMTP_PORT").ok(),
            std::env::var("PASSGATE_SMTP_USER").ok(),
            std::env::var("PASSGATE_SMTP_PASS").ok(),
            std::env::var("PASSGATE_SMTP_FROM").ok(),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid PASSGATE_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            notify_secret,
            host,
            port,
            base_url,
            send_url,
            token_ttl_minutes,
            session_ttl_minutes,
            reveal_accounts,
            log_level,
            smtp,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_minutes(key: &str, default: &str) -> Result<i64, String> {
    let minutes: i64 = env_or(key, default)
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))?;
    if minutes <= 0 {
        return Err(format!("Invalid {key}: must be positive"));
    }
    Ok(minutes)
}
