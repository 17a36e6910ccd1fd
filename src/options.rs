use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::parse::{
    parse_integer, parse_integer_array, parse_integer_list_str, parse_integer_str, positive_u32,
    positive_u64, status_codes,
};

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_SIGNAL_TIMEOUT_MS: u64 = 100;
const DEFAULT_RETRY_TIMEOUT_MS: u64 = 100;
const DEFAULT_ACCEPT_STATUS_CODES: [u16; 1] = [200];

// Canonical key first, then older spellings still seen in caller configs.
const MAX_RETRIES_KEYS: &[&str] = &["maxRetries", "retries"];
const SIGNAL_TIMEOUT_KEYS: &[&str] = &["signalTimeout"];
const RETRY_TIMEOUT_KEYS: &[&str] = &["retryTimeout", "timeout"];
const ACCEPT_STATUS_CODES_KEYS: &[&str] = &["acceptStatusCodes", "statusCodes", "resolveOn"];
const RETRY_STATUS_CODES_KEYS: &[&str] = &["retryStatusCodes", "retryOn"];

/// Configures attempt count, timeouts and status-code classification.
///
/// Build one directly, or normalize a loosely-typed value with
/// [`RetryOptions::from_value`]. Normalization never fails: missing or
/// malformed fields take their defaults.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryOptions {
    /// Total number of attempts, including the first one.
    pub max_retries: u32,
    /// Per-attempt timeout in milliseconds before the request is aborted.
    #[serde(rename = "signalTimeout")]
    pub signal_timeout_ms: u64,
    /// Fixed delay in milliseconds between attempts.
    #[serde(rename = "retryTimeout")]
    pub retry_timeout_ms: u64,
    /// Statuses returned to the caller as success.
    pub accept_status_codes: Vec<u16>,
    /// Statuses worth retrying. Empty means every non-accepted status retries.
    pub retry_status_codes: Vec<u16>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            signal_timeout_ms: DEFAULT_SIGNAL_TIMEOUT_MS,
            retry_timeout_ms: DEFAULT_RETRY_TIMEOUT_MS,
            accept_status_codes: DEFAULT_ACCEPT_STATUS_CODES.to_vec(),
            retry_status_codes: Vec::new(),
        }
    }
}

impl RetryOptions {
    /// Normalizes a loosely-typed options object.
    ///
    /// `None`, non-object values and unknown keys are ignored. Integers may be
    /// JSON numbers or decimal strings; status code fields must be arrays.
    pub fn from_value(raw: Option<&Value>) -> Self {
        let defaults = Self::default();
        let Some(object) = raw.and_then(Value::as_object) else {
            return defaults;
        };
        let field = |keys: &[&str]| keys.iter().find_map(|key| object.get(*key));

        Self {
            max_retries: field(MAX_RETRIES_KEYS)
                .and_then(parse_integer)
                .and_then(positive_u32)
                .unwrap_or(defaults.max_retries),
            signal_timeout_ms: field(SIGNAL_TIMEOUT_KEYS)
                .and_then(parse_integer)
                .and_then(positive_u64)
                .unwrap_or(defaults.signal_timeout_ms),
            retry_timeout_ms: field(RETRY_TIMEOUT_KEYS)
                .and_then(parse_integer)
                .and_then(positive_u64)
                .unwrap_or(defaults.retry_timeout_ms),
            accept_status_codes: field(ACCEPT_STATUS_CODES_KEYS)
                .and_then(parse_integer_array)
                .and_then(status_codes)
                .unwrap_or(defaults.accept_status_codes),
            retry_status_codes: field(RETRY_STATUS_CODES_KEYS)
                .and_then(parse_integer_array)
                .and_then(status_codes)
                .unwrap_or(defaults.retry_status_codes),
        }
    }

    /// Normalizes options from JSON text. Invalid JSON yields the defaults.
    pub fn from_json_str(json: &str) -> Self {
        let raw = serde_json::from_str::<Value>(json).ok();
        Self::from_value(raw.as_ref())
    }

    /// Reads options from environment variables.
    ///
    /// Reads:
    /// - `RFETCH_MAX_RETRIES`
    /// - `RFETCH_SIGNAL_TIMEOUT_MS`
    /// - `RFETCH_RETRY_TIMEOUT_MS`
    /// - `RFETCH_ACCEPT_STATUS_CODES` — comma separated, e.g. `200,204`
    /// - `RFETCH_RETRY_STATUS_CODES` — comma separated
    ///
    /// Unset or malformed variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let integer = |name: &str| lookup(name).as_deref().and_then(parse_integer_str);
        let codes = |name: &str| {
            lookup(name)
                .as_deref()
                .and_then(parse_integer_list_str)
                .and_then(status_codes)
        };

        Self {
            max_retries: integer("RFETCH_MAX_RETRIES")
                .and_then(positive_u32)
                .unwrap_or(defaults.max_retries),
            signal_timeout_ms: integer("RFETCH_SIGNAL_TIMEOUT_MS")
                .and_then(positive_u64)
                .unwrap_or(defaults.signal_timeout_ms),
            retry_timeout_ms: integer("RFETCH_RETRY_TIMEOUT_MS")
                .and_then(positive_u64)
                .unwrap_or(defaults.retry_timeout_ms),
            accept_status_codes: codes("RFETCH_ACCEPT_STATUS_CODES")
                .unwrap_or(defaults.accept_status_codes),
            retry_status_codes: codes("RFETCH_RETRY_STATUS_CODES")
                .unwrap_or(defaults.retry_status_codes),
        }
    }

    /// Replaces out-of-range fields of a typed value with their defaults.
    pub fn normalize(&self) -> Self {
        let defaults = Self::default();
        Self {
            max_retries: if self.max_retries == 0 {
                defaults.max_retries
            } else {
                self.max_retries
            },
            signal_timeout_ms: if self.signal_timeout_ms == 0 {
                defaults.signal_timeout_ms
            } else {
                self.signal_timeout_ms
            },
            retry_timeout_ms: if self.retry_timeout_ms == 0 {
                defaults.retry_timeout_ms
            } else {
                self.retry_timeout_ms
            },
            accept_status_codes: self.accept_status_codes.clone(),
            retry_status_codes: self.retry_status_codes.clone(),
        }
    }

    /// Serializes with the canonical camelCase keys.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn signal_timeout(&self) -> Duration {
        Duration::from_millis(self.signal_timeout_ms)
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_millis(self.retry_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::RetryOptions;

    #[test]
    fn missing_input_yields_defaults() {
        let defaults = RetryOptions::default();
        assert_eq!(RetryOptions::from_value(None), defaults);
        assert_eq!(RetryOptions::from_value(Some(&json!({}))), defaults);
        assert_eq!(RetryOptions::from_value(Some(&json!([1, 2]))), defaults);
        assert_eq!(RetryOptions::from_value(Some(&json!(null))), defaults);
        assert_eq!(defaults.max_retries, 3);
        assert_eq!(defaults.signal_timeout_ms, 100);
        assert_eq!(defaults.retry_timeout_ms, 100);
        assert_eq!(defaults.accept_status_codes, vec![200]);
        assert!(defaults.retry_status_codes.is_empty());
    }

    #[test]
    fn partial_input_keeps_other_defaults() {
        let options = RetryOptions::from_value(Some(&json!({
            "maxRetries": 5,
            "retryStatusCodes": [503, 408],
            "errorSink": [],
            "unknown": "ignored"
        })));
        assert_eq!(
            options,
            RetryOptions {
                max_retries: 5,
                retry_status_codes: vec![503, 408],
                ..RetryOptions::default()
            }
        );
    }

    #[test]
    fn invalid_fields_fall_back_without_failing() {
        let options = RetryOptions::from_value(Some(&json!({
            "maxRetries": "lots",
            "signalTimeout": -5,
            "retryTimeout": 0,
            "acceptStatusCodes": 200,
            "retryStatusCodes": [503, "nope"]
        })));
        assert_eq!(options, RetryOptions::default());
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let options = RetryOptions::from_value(Some(&json!({
            "maxRetries": "4",
            "signalTimeout": "250",
            "acceptStatusCodes": ["200", 204]
        })));
        assert_eq!(options.max_retries, 4);
        assert_eq!(options.signal_timeout_ms, 250);
        assert_eq!(options.accept_status_codes, vec![200, 204]);
    }

    #[test]
    fn legacy_aliases_apply_when_canonical_key_is_missing() {
        let options = RetryOptions::from_value(Some(&json!({
            "retries": 5,
            "resolveOn": [200, 201],
            "retryOn": [418, 408, 503],
            "timeout": 50
        })));
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.accept_status_codes, vec![200, 201]);
        assert_eq!(options.retry_status_codes, vec![418, 408, 503]);
        assert_eq!(options.retry_timeout_ms, 50);

        let options = RetryOptions::from_value(Some(&json!({ "maxRetries": 2, "retries": 9 })));
        assert_eq!(options.max_retries, 2);
    }

    #[test]
    fn normalization_is_idempotent() {
        let options = RetryOptions::from_value(Some(&json!({
            "maxRetries": 7,
            "signalTimeout": 30,
            "retryTimeout": 10,
            "acceptStatusCodes": [200, 204],
            "retryStatusCodes": [503]
        })));
        assert_eq!(RetryOptions::from_value(Some(&options.to_value())), options);
        assert_eq!(options.normalize(), options);
        assert_eq!(options.normalize().normalize(), options.normalize());

        let zeroed = RetryOptions {
            max_retries: 0,
            signal_timeout_ms: 0,
            retry_timeout_ms: 0,
            ..RetryOptions::default()
        };
        assert_eq!(zeroed.normalize(), RetryOptions::default());
    }

    #[test]
    fn serializes_canonical_keys() {
        let value = RetryOptions::default().to_value();
        assert_eq!(
            value,
            json!({
                "maxRetries": 3,
                "signalTimeout": 100,
                "retryTimeout": 100,
                "acceptStatusCodes": [200],
                "retryStatusCodes": []
            })
        );
    }

    #[test]
    fn json_text_falls_back_on_syntax_errors() {
        assert_eq!(RetryOptions::from_json_str("{not json"), RetryOptions::default());
        assert_eq!(
            RetryOptions::from_json_str(r#"{"maxRetries": 1}"#).max_retries,
            1
        );
    }

    #[test]
    fn env_lookup_parses_lists() {
        let vars: HashMap<&str, &str> = [
            ("RFETCH_MAX_RETRIES", "6"),
            ("RFETCH_SIGNAL_TIMEOUT_MS", "abc"),
            ("RFETCH_ACCEPT_STATUS_CODES", "200, 204"),
            ("RFETCH_RETRY_STATUS_CODES", "503,x"),
        ]
        .into_iter()
        .collect();
        let options =
            RetryOptions::from_lookup(|name| vars.get(name).map(|value| (*value).to_owned()));
        assert_eq!(options.max_retries, 6);
        assert_eq!(options.signal_timeout_ms, 100);
        assert_eq!(options.accept_status_codes, vec![200, 204]);
        assert!(options.retry_status_codes.is_empty());
    }
}
