//! Environment-driven settings for the relay writer stage.
//!
//! Every numeric knob is validated as a positive, bounded value at startup;
//! a bad value aborts the process with the offending variable named.

use core_config::{
    env_flag, env_or_default, env_parsed, env_required, ConfigError, FromEnv,
};
use stream_relay::{RetryPolicy, SenderConfig};

/// Where messages come from.
#[derive(Clone, Debug)]
pub struct SourceSettings {
    /// Connection URL of the local Redis, e.g. `redis://localhost:6379`.
    pub url: String,
    /// Input streams are named `{prefix}:{stream_id}`.
    pub input_stream_prefix: String,
    pub stream_ids: Vec<String>,
    /// Server-side XREAD block window.
    pub read_block_ms: u64,
    /// Max entries per XREAD.
    pub read_count: usize,
}

impl SourceSettings {
    pub fn stream_keys(&self) -> Vec<String> {
        self.stream_ids
            .iter()
            .map(|id| format!("{}:{}", self.input_stream_prefix, id))
            .collect()
    }
}

impl FromEnv for SourceSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_required("SOURCE_REDIS_URL")?;
        let input_stream_prefix = env_or_default("INPUT_STREAM_PREFIX", "objecttracker");

        let stream_ids: Vec<String> = env_or_default("STREAM_IDS", "stream1")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if stream_ids.is_empty() {
            return Err(ConfigError::OutOfRange {
                key: "STREAM_IDS".to_string(),
                details: "at least one stream id is required".to_string(),
            });
        }

        let read_block_ms = env_parsed("READ_BLOCK_MS", 2000u64)?;
        require_positive("READ_BLOCK_MS", read_block_ms)?;
        let read_count = env_parsed("READ_COUNT", 10usize)?;
        require_positive("READ_COUNT", read_count as u64)?;

        Ok(Self {
            url,
            input_stream_prefix,
            stream_ids,
            read_block_ms,
            read_count,
        })
    }
}

/// Where messages go.
#[derive(Clone, Debug)]
pub struct TargetSettings {
    pub host: String,
    pub port: u16,
    /// Output streams are named `{prefix}:{stream_id}`.
    pub output_stream_prefix: String,
    /// Buffer capacity and batch ceiling of the sender.
    pub buffer_length: usize,
    /// MAXLEN cap applied to each destination stream.
    pub target_stream_maxlen: i64,
    /// Use a certificate-verified encrypted connection.
    pub tls: bool,
    /// Per-command response timeout on the target connection.
    pub response_timeout_ms: u64,
}

impl TargetSettings {
    /// Connection URL; the `rediss` scheme turns on TLS in the client.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl FromEnv for TargetSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_required("TARGET_REDIS_HOST")?;

        let port: u16 = env_required("TARGET_REDIS_PORT")?.parse().map_err(|e| {
            ConfigError::ParseError {
                key: "TARGET_REDIS_PORT".to_string(),
                details: format!("{}", e),
            }
        })?;
        if port == 0 {
            return Err(ConfigError::OutOfRange {
                key: "TARGET_REDIS_PORT".to_string(),
                details: "must be between 1 and 65535".to_string(),
            });
        }

        let output_stream_prefix = env_or_default("OUTPUT_STREAM_PREFIX", "output");

        let buffer_length = env_parsed("BUFFER_LENGTH", 10usize)?;
        require_positive("BUFFER_LENGTH", buffer_length as u64)?;

        let target_stream_maxlen = env_parsed("TARGET_STREAM_MAXLEN", 100i64)?;
        if target_stream_maxlen < 1 {
            return Err(ConfigError::OutOfRange {
                key: "TARGET_STREAM_MAXLEN".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        let tls = env_flag("TARGET_REDIS_TLS", false)?;

        let response_timeout_ms = env_parsed("TARGET_RESPONSE_TIMEOUT_MS", 2000u64)?;
        require_positive("TARGET_RESPONSE_TIMEOUT_MS", response_timeout_ms)?;

        Ok(Self {
            host,
            port,
            output_stream_prefix,
            buffer_length,
            target_stream_maxlen,
            tls,
            response_timeout_ms,
        })
    }
}

/// Backoff knobs for the sender's retry sequences.
fn retry_policy_from_env() -> Result<RetryPolicy, ConfigError> {
    let policy = RetryPolicy {
        max_attempts: env_parsed("SEND_MAX_ATTEMPTS", 7u32)?,
        base_delay_ms: env_parsed("SEND_BACKOFF_BASE_MS", 50u64)?,
        backoff_factor: env_parsed("SEND_BACKOFF_FACTOR", 2.0f64)?,
        max_delay_ms: env_parsed("SEND_BACKOFF_MAX_MS", 5000u64)?,
    };
    policy.validate()?;
    Ok(policy)
}

/// Everything the stage needs, loaded and validated in one place.
#[derive(Clone, Debug)]
pub struct WriterSettings {
    pub source: SourceSettings,
    pub target: TargetSettings,
    pub retry: RetryPolicy,
    /// Strip raw frame data from envelopes before forwarding.
    pub redact_frame_data: bool,
}

impl WriterSettings {
    /// The sender configuration derived from these settings.
    pub fn sender_config(&self) -> SenderConfig {
        SenderConfig::default()
            .with_buffer_length(self.target.buffer_length)
            .with_retry(self.retry.clone())
    }
}

impl FromEnv for WriterSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            source: SourceSettings::from_env()?,
            target: TargetSettings::from_env()?,
            retry: retry_policy_from_env()?,
            redact_frame_data: env_flag("REDACT_FRAME_DATA", false)?,
        })
    }
}

fn require_positive(key: &str, value: u64) -> Result<(), ConfigError> {
    if value < 1 {
        return Err(ConfigError::OutOfRange {
            key: key.to_string(),
            details: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [(&str, Option<&str>); 3] = [
        ("SOURCE_REDIS_URL", Some("redis://localhost:6379")),
        ("TARGET_REDIS_HOST", Some("remote.example")),
        ("TARGET_REDIS_PORT", Some("6380")),
    ];

    #[test]
    fn test_defaults_applied() {
        temp_env::with_vars(REQUIRED, || {
            let settings = WriterSettings::from_env().unwrap();

            assert_eq!(settings.source.input_stream_prefix, "objecttracker");
            assert_eq!(settings.source.stream_ids, vec!["stream1"]);
            assert_eq!(settings.source.read_block_ms, 2000);
            assert_eq!(settings.target.output_stream_prefix, "output");
            assert_eq!(settings.target.buffer_length, 10);
            assert_eq!(settings.target.target_stream_maxlen, 100);
            assert!(!settings.target.tls);
            assert_eq!(settings.retry.max_attempts, 7);
            assert_eq!(settings.retry.base_delay_ms, 50);
            assert!(!settings.redact_frame_data);
        });
    }

    #[test]
    fn test_source_url_is_required() {
        temp_env::with_vars(
            [
                ("SOURCE_REDIS_URL", None::<&str>),
                ("TARGET_REDIS_HOST", Some("remote.example")),
                ("TARGET_REDIS_PORT", Some("6380")),
            ],
            || {
                let err = WriterSettings::from_env().unwrap_err();
                assert!(err.to_string().contains("SOURCE_REDIS_URL"));
            },
        );
    }

    #[test]
    fn test_stream_keys_join_prefix_and_ids() {
        temp_env::with_vars(
            REQUIRED
                .into_iter()
                .chain([("STREAM_IDS", Some("cam1, cam2"))])
                .collect::<Vec<_>>(),
            || {
                let settings = WriterSettings::from_env().unwrap();
                assert_eq!(
                    settings.source.stream_keys(),
                    vec!["objecttracker:cam1", "objecttracker:cam2"]
                );
            },
        );
    }

    #[test]
    fn test_tls_switches_url_scheme() {
        temp_env::with_vars(
            REQUIRED
                .into_iter()
                .chain([("TARGET_REDIS_TLS", Some("true"))])
                .collect::<Vec<_>>(),
            || {
                let settings = WriterSettings::from_env().unwrap();
                assert_eq!(settings.target.url(), "rediss://remote.example:6380");
            },
        );
        temp_env::with_vars(REQUIRED, || {
            let settings = WriterSettings::from_env().unwrap();
            assert_eq!(settings.target.url(), "redis://remote.example:6380");
        });
    }

    #[test]
    fn test_zero_buffer_length_rejected() {
        temp_env::with_vars(
            REQUIRED
                .into_iter()
                .chain([("BUFFER_LENGTH", Some("0"))])
                .collect::<Vec<_>>(),
            || {
                let err = WriterSettings::from_env().unwrap_err();
                assert!(err.to_string().contains("BUFFER_LENGTH"));
            },
        );
    }

    #[test]
    fn test_invalid_port_rejected() {
        for bad in ["0", "notaport", "70000"] {
            temp_env::with_vars(
                [
                    ("SOURCE_REDIS_URL", Some("redis://localhost:6379")),
                    ("TARGET_REDIS_HOST", Some("remote.example")),
                    ("TARGET_REDIS_PORT", Some(bad)),
                ],
                || {
                    let err = WriterSettings::from_env().unwrap_err();
                    assert!(err.to_string().contains("TARGET_REDIS_PORT"));
                },
            );
        }
    }

    #[test]
    fn test_backoff_factor_must_exceed_one() {
        temp_env::with_vars(
            REQUIRED
                .into_iter()
                .chain([("SEND_BACKOFF_FACTOR", Some("1.0"))])
                .collect::<Vec<_>>(),
            || {
                let err = WriterSettings::from_env().unwrap_err();
                assert!(err.to_string().contains("backoff_factor"));
            },
        );
    }

    #[test]
    fn test_sender_config_carries_buffer_and_retry() {
        temp_env::with_vars(
            REQUIRED
                .into_iter()
                .chain([
                    ("BUFFER_LENGTH", Some("32")),
                    ("SEND_MAX_ATTEMPTS", Some("4")),
                ])
                .collect::<Vec<_>>(),
            || {
                let settings = WriterSettings::from_env().unwrap();
                let config = settings.sender_config();
                assert_eq!(config.buffer_length, 32);
                assert_eq!(config.retry.max_attempts, 4);
                assert!(config.validate().is_ok());
            },
        );
    }

    #[test]
    fn test_empty_stream_ids_rejected() {
        temp_env::with_vars(
            REQUIRED
                .into_iter()
                .chain([("STREAM_IDS", Some(" , "))])
                .collect::<Vec<_>>(),
            || {
                let err = WriterSettings::from_env().unwrap_err();
                assert!(err.to_string().contains("STREAM_IDS"));
            },
        );
    }
}
