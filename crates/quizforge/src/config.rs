//! Server settings read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::QuizforgeError;

/// Default listen address when neither `QUIZFORGE_BIND` nor `PORT` is set.
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// Gateway settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// JSON question file. The built-in bank is used when unset.
    pub questions_path: Option<PathBuf>,
    /// Connections silent for longer than this are dropped.
    pub idle_timeout: Duration,
    /// How long a new connection has to send its handshake.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            questions_path: None,
            idle_timeout: Duration::from_secs(60),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Reads `QUIZFORGE_BIND`, `PORT`, `QUIZFORGE_QUESTIONS` and
    /// `QUIZFORGE_IDLE_TIMEOUT_SECS`, falling back to defaults.
    ///
    /// `QUIZFORGE_BIND` wins over `PORT`; a bare `PORT` binds all
    /// interfaces.
    pub fn from_env() -> Result<Self, QuizforgeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, QuizforgeError> {
        let mut config = Self::default();

        if let Some(bind) = lookup("QUIZFORGE_BIND").filter(|v| !v.trim().is_empty()) {
            config.bind_addr = bind.trim().to_string();
        } else if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| QuizforgeError::Config(format!("PORT is not a port number: {port:?}")))?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }

        if let Some(path) = lookup("QUIZFORGE_QUESTIONS").filter(|v| !v.trim().is_empty()) {
            config.questions_path = Some(PathBuf::from(path.trim()));
        }

        if let Some(secs) = lookup("QUIZFORGE_IDLE_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                QuizforgeError::Config(format!(
                    "QUIZFORGE_IDLE_TIMEOUT_SECS is not a number of seconds: {secs:?}"
                ))
            })?;
            if secs == 0 {
                return Err(QuizforgeError::Config(
                    "QUIZFORGE_IDLE_TIMEOUT_SECS must be positive".to_string(),
                ));
            }
            config.idle_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ServerConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_port_fallback() {
        let config = ServerConfig::from_lookup(env(&[("PORT", "8080")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_bind_beats_port() {
        let config = ServerConfig::from_lookup(env(&[
            ("QUIZFORGE_BIND", "127.0.0.1:4000"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:4000");
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let err = ServerConfig::from_lookup(env(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, QuizforgeError::Config(_)));
    }

    #[test]
    fn test_idle_timeout_and_questions() {
        let config = ServerConfig::from_lookup(env(&[
            ("QUIZFORGE_IDLE_TIMEOUT_SECS", "15"),
            ("QUIZFORGE_QUESTIONS", "/etc/quiz.json"),
        ]))
        .unwrap();
        assert_eq!(config.idle_timeout, Duration::from_secs(15));
        assert_eq!(config.questions_path, Some(PathBuf::from("/etc/quiz.json")));
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        let result = ServerConfig::from_lookup(env(&[("QUIZFORGE_IDLE_TIMEOUT_SECS", "0")]));
        assert!(result.is_err());
    }
}
