//! Configuration for the due-sync service.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default HTTP port.
const DEFAULT_PORT: u16 = 3000;

/// Default timeout applied by the backend HTTP client.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be interpreted.
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// How a category's date set is reduced to a single date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NearestDatePolicy {
    /// Chronologically earliest date in the set.
    Earliest,
    /// Soonest upcoming date, falling back to the most recent past date.
    #[default]
    NearestToNow,
}

/// What happens when one category search fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchFailurePolicy {
    /// Any failed search aborts the whole request.
    Strict,
    /// A failed search yields an empty date set for its category.
    #[default]
    Tolerant,
}

/// Response when the webhook carries no parent identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingParentPolicy {
    /// Respond 400.
    #[default]
    Reject,
    /// Respond 200 with an informational message.
    Acknowledge,
}

/// Shape of the attribute patch sent to the parent record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PatchMode {
    /// Only fields with a reduced date are sent.
    #[default]
    Sparse,
    /// All three fields are sent, absent dates as empty strings.
    Full,
}

macro_rules! impl_policy_from_str {
    ($ty:ty, $key:literal, { $($name:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    _ => Err(ConfigError::Invalid {
                        key: $key,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

impl_policy_from_str!(NearestDatePolicy, "NEAREST_DATE_POLICY", {
    "earliest" => NearestDatePolicy::Earliest,
    "nearest-to-now" => NearestDatePolicy::NearestToNow,
    "nearest" => NearestDatePolicy::NearestToNow,
});

impl_policy_from_str!(SearchFailurePolicy, "SEARCH_FAILURE_POLICY", {
    "strict" => SearchFailurePolicy::Strict,
    "tolerant" => SearchFailurePolicy::Tolerant,
});

impl_policy_from_str!(MissingParentPolicy, "MISSING_PARENT_POLICY", {
    "reject" => MissingParentPolicy::Reject,
    "acknowledge" => MissingParentPolicy::Acknowledge,
});

impl_policy_from_str!(PatchMode, "PATCH_MODE", {
    "sparse" => PatchMode::Sparse,
    "full" => PatchMode::Full,
});

/// Behavioural switches for a reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub nearest_date: NearestDatePolicy,
    pub search_failure: SearchFailurePolicy,
    pub missing_parent: MissingParentPolicy,
    pub patch_mode: PatchMode,
    /// Shift every reduced date forward by one day before writing it.
    pub shift_due_dates: bool,
}

/// Service configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// Base URL of the record backend (no trailing slash).
    pub endpoint_domain: String,
    /// Bearer token forwarded to the record backend.
    pub access_token: String,
    /// Timeout for each backend request.
    pub request_timeout: Duration,
    /// Reconciliation policies.
    pub policy: ReconcilePolicy,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("endpoint_domain", &self.endpoint_domain)
            .field("access_token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Config {
    /// Build a configuration with default port, timeout and policies.
    #[must_use]
    pub fn new(endpoint_domain: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            endpoint_domain: normalize_domain(&endpoint_domain.into()),
            access_token: access_token.into(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            policy: ReconcilePolicy::default(),
        }
    }

    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let endpoint_domain =
            get("ENDPOINT_DOMAIN").ok_or(ConfigError::Missing("ENDPOINT_DOMAIN"))?;
        let access_token = get("ACCESS_TOKEN").ok_or(ConfigError::Missing("ACCESS_TOKEN"))?;

        let port = match get("DUE_SYNC_PORT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "DUE_SYNC_PORT",
                value: v,
            })?,
            None => DEFAULT_PORT,
        };

        let timeout_secs = match get("HTTP_TIMEOUT_SECS") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "HTTP_TIMEOUT_SECS",
                value: v,
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let policy = ReconcilePolicy {
            nearest_date: parse_or_default(get("NEAREST_DATE_POLICY"))?,
            search_failure: parse_or_default(get("SEARCH_FAILURE_POLICY"))?,
            missing_parent: parse_or_default(get("MISSING_PARENT_POLICY"))?,
            patch_mode: parse_or_default(get("PATCH_MODE"))?,
            shift_due_dates: parse_flag("SHIFT_DUE_DATES", get("SHIFT_DUE_DATES"))?,
        };

        Ok(Self {
            port,
            endpoint_domain: normalize_domain(&endpoint_domain),
            access_token,
            request_timeout: Duration::from_secs(timeout_secs),
            policy,
        })
    }
}

fn parse_or_default<T>(value: Option<String>) -> Result<T, ConfigError>
where
    T: FromStr<Err = ConfigError> + Default,
{
    value.map_or_else(|| Ok(T::default()), |v| v.parse())
}

/// Boolean switch: `true`/`1` or `false`/`0`, off when unset.
fn parse_flag(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_only_required_set() {
        let config = Config::from_lookup(lookup_from(&[
            ("ENDPOINT_DOMAIN", "https://records.example.com/api/"),
            ("ACCESS_TOKEN", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.endpoint_domain, "https://records.example.com/api");
        assert_eq!(config.access_token, "secret");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.policy, ReconcilePolicy::default());
        assert_eq!(config.policy.nearest_date, NearestDatePolicy::NearestToNow);
        assert_eq!(config.policy.search_failure, SearchFailurePolicy::Tolerant);
        assert_eq!(config.policy.missing_parent, MissingParentPolicy::Reject);
        assert_eq!(config.policy.patch_mode, PatchMode::Sparse);
        assert!(!config.policy.shift_due_dates);
    }

    #[test]
    fn test_missing_required_values() {
        let err = Config::from_lookup(lookup_from(&[("ACCESS_TOKEN", "secret")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("ENDPOINT_DOMAIN"));

        let err = Config::from_lookup(lookup_from(&[
            ("ENDPOINT_DOMAIN", "https://records.example.com"),
            ("ACCESS_TOKEN", "   "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("ACCESS_TOKEN"));
    }

    #[test]
    fn test_policy_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("ENDPOINT_DOMAIN", "https://records.example.com"),
            ("ACCESS_TOKEN", "secret"),
            ("DUE_SYNC_PORT", "9000"),
            ("HTTP_TIMEOUT_SECS", "5"),
            ("NEAREST_DATE_POLICY", "Earliest"),
            ("SEARCH_FAILURE_POLICY", "strict"),
            ("MISSING_PARENT_POLICY", "acknowledge"),
            ("PATCH_MODE", "full"),
            ("SHIFT_DUE_DATES", "1"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.policy.nearest_date, NearestDatePolicy::Earliest);
        assert_eq!(config.policy.search_failure, SearchFailurePolicy::Strict);
        assert_eq!(config.policy.missing_parent, MissingParentPolicy::Acknowledge);
        assert_eq!(config.policy.patch_mode, PatchMode::Full);
        assert!(config.policy.shift_due_dates);
    }

    #[test]
    fn test_invalid_policy_name() {
        let err = Config::from_lookup(lookup_from(&[
            ("ENDPOINT_DOMAIN", "https://records.example.com"),
            ("ACCESS_TOKEN", "secret"),
            ("NEAREST_DATE_POLICY", "latest"),
        ]))
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "NEAREST_DATE_POLICY",
                value: "latest".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(lookup_from(&[
            ("ENDPOINT_DOMAIN", "https://records.example.com"),
            ("ACCESS_TOKEN", "secret"),
            ("DUE_SYNC_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DUE_SYNC_PORT", .. }));
    }

    #[test]
    fn test_shift_flag_values() {
        for (raw, expected) in [("TRUE", true), ("1", true), ("false", false), (" 0 ", false)] {
            let config = Config::from_lookup(lookup_from(&[
                ("ENDPOINT_DOMAIN", "https://records.example.com"),
                ("ACCESS_TOKEN", "secret"),
                ("SHIFT_DUE_DATES", raw),
            ]))
            .unwrap();
            assert_eq!(config.policy.shift_due_dates, expected, "value: {raw}");
        }

        for raw in ["yes", "on", "2"] {
            let err = Config::from_lookup(lookup_from(&[
                ("ENDPOINT_DOMAIN", "https://records.example.com"),
                ("ACCESS_TOKEN", "secret"),
                ("SHIFT_DUE_DATES", raw),
            ]))
            .unwrap_err();
            assert_eq!(
                err,
                ConfigError::Invalid {
                    key: "SHIFT_DUE_DATES",
                    value: raw.to_string()
                }
            );
        }
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = Config::new("https://records.example.com", "super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
