use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use omnitool_ai::{
    sessions::{DEFAULT_IDLE_TTL, DEFAULT_MAX_SESSIONS},
    GeminiConfig,
};

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub max_chat_sessions: usize,
    pub chat_idle_ttl: Duration,
    pub gemini: GeminiConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let raw_addr =
            std::env::var("OMNI_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let listen_addr: SocketAddr = raw_addr
            .parse()
            .with_context(|| format!("Invalid OMNI_LISTEN_ADDR: {}", raw_addr))?;
        let cors_allow = parse_origins(
            &std::env::var("OMNI_CORS_ALLOW_ORIGINS").unwrap_or_else(|_| "*".into()),
        );
        let max_chat_sessions = match std::env::var("OMNI_MAX_CHAT_SESSIONS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("Invalid OMNI_MAX_CHAT_SESSIONS: {}", raw))?,
            Err(_) => DEFAULT_MAX_SESSIONS,
        };
        let chat_idle_ttl = match std::env::var("OMNI_CHAT_IDLE_TTL_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("Invalid OMNI_CHAT_IDLE_TTL_SECS: {}", raw))?,
            ),
            Err(_) => DEFAULT_IDLE_TTL,
        };
        let gemini = GeminiConfig::from_env()?;
        Ok(Self {
            listen_addr,
            cors_allow,
            max_chat_sessions,
            chat_idle_ttl,
            gemini,
        })
    }

    /// Local defaults with an explicit backend config; used by tests.
    pub fn with_gemini(gemini: GeminiConfig) -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            cors_allow: vec!["*".to_string()],
            max_chat_sessions: DEFAULT_MAX_SESSIONS,
            chat_idle_ttl: DEFAULT_IDLE_TTL,
            gemini,
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_skips_blanks() {
        assert_eq!(
            parse_origins("http://a.test, ,http://b.test,"),
            vec!["http://a.test", "http://b.test"]
        );
        assert!(parse_origins("").is_empty());
    }
}
