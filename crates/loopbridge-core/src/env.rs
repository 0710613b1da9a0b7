//! Environment variable helpers
//!
//! Used by `kprint` and by the runtime's `BridgeConfig::from_env()`.
//! A variable that is unset or fails to parse falls back to the default.

use std::str::FromStr;

/// Parse `key` as `T`, or return `default`
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Parse `key` as `T` if it is set and valid
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Boolean flag: "1", "true", "yes", "on" (any case) are true,
/// any other value is false, unset returns `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// String value of `key`, or `default`
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_returns_default() {
        let n: usize = env_get("__LB_TEST_UNSET__", 16);
        assert_eq!(n, 16);
        assert!(env_get_opt::<u64>("__LB_TEST_UNSET__").is_none());
        assert!(env_get_bool("__LB_TEST_UNSET__", true));
        assert_eq!(env_get_str("__LB_TEST_UNSET__", "poller"), "poller");
    }

    #[test]
    fn test_parse_set_value() {
        std::env::set_var("__LB_TEST_NUM__", " 32 ");
        assert_eq!(env_get::<usize>("__LB_TEST_NUM__", 0), 32);
        std::env::remove_var("__LB_TEST_NUM__");
    }

    #[test]
    fn test_invalid_value_falls_back() {
        std::env::set_var("__LB_TEST_BAD__", "sixteen");
        assert_eq!(env_get::<usize>("__LB_TEST_BAD__", 16), 16);
        std::env::remove_var("__LB_TEST_BAD__");
    }

    #[test]
    fn test_bool_variants() {
        for (val, expected) in [("1", true), ("TRUE", true), ("on", true), ("0", false), ("nope", false)] {
            std::env::set_var("__LB_TEST_BOOL__", val);
            assert_eq!(env_get_bool("__LB_TEST_BOOL__", !expected), expected, "value {val}");
        }
        std::env::remove_var("__LB_TEST_BOOL__");
    }
}
