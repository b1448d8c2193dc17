// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Typed configuration schema

use std::fmt;
use std::str::FromStr;

use lockstep_logging::LoggingConfig;
use nix::sys::signal::Signal;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// When the main thread gets designated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitTrigger {
    /// The thread that first calls `SDL_Init`
    #[default]
    SdlInit,
    /// The thread that loads the runtime
    Load,
}

impl fmt::Display for InitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitTrigger::SdlInit => write!(f, "sdl-init"),
            InitTrigger::Load => write!(f, "load"),
        }
    }
}

/// Fixed process id reported to callers living in a matching library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidOverride {
    /// Substring matched against the path of the calling object
    pub library: String,
    pub pid: i32,
}

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RuntimeConfig {
    /// Entry point keys whose threads pause the main thread
    #[serde(deserialize_with = "deserialize_keys")]
    pub interest_keys: Vec<i64>,

    /// Signal used to park the main thread, e.g. `SIGUSR1`
    pub pause_signal: String,

    pub init_trigger: InitTrigger,

    /// Log the thread summary when the process exits
    pub summary_on_exit: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pid_overrides: Vec<PidOverride>,

    pub log: LoggingConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interest_keys: Vec::new(),
            pause_signal: "SIGUSR1".to_string(),
            init_trigger: InitTrigger::default(),
            summary_on_exit: true,
            pid_overrides: Vec::new(),
            log: LoggingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parsed [`pause_signal`](Self::pause_signal). Accepts `SIGUSR2` or `USR2`.
    pub fn pause_signal(&self) -> Result<Signal, ConfigError> {
        parse_pause_signal(&self.pause_signal)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pause_signal()?;
        for entry in &self.pid_overrides {
            if entry.library.is_empty() {
                return Err(ConfigError::EmptyPidOverride { pid: entry.pid });
            }
        }
        Ok(())
    }

    /// Pid reported to code in `object_path`, if an override applies.
    pub fn pid_override_for(&self, object_path: &str) -> Option<i32> {
        self.pid_overrides
            .iter()
            .find(|entry| object_path.contains(entry.library.as_str()))
            .map(|entry| entry.pid)
    }
}

pub fn parse_pause_signal(name: &str) -> Result<Signal, ConfigError> {
    let trimmed = name.trim().to_ascii_uppercase();
    let full = if trimmed.starts_with("SIG") {
        trimmed
    } else {
        format!("SIG{trimmed}")
    };
    let signal = Signal::from_str(&full).map_err(|_| ConfigError::UnknownSignal {
        name: name.to_string(),
    })?;
    match signal {
        Signal::SIGKILL | Signal::SIGSTOP => Err(ConfigError::UncatchableSignal { signal }),
        signal => Ok(signal),
    }
}

// Keys arrive as a TOML integer array, a single integer, or (from the
// environment) a comma-separated string.
fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct KeysVisitor;

    impl<'de> Visitor<'de> for KeysVisitor {
        type Value = Vec<i64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a list of entry point keys")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(vec![v])
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            i64::try_from(v).map(|v| vec![v]).map_err(E::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| parse_key(part).map_err(E::custom))
                .collect()
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut keys = Vec::new();
            while let Some(KeyEntry(key)) = seq.next_element()? {
                keys.push(key);
            }
            Ok(keys)
        }
    }

    deserializer.deserialize_any(KeysVisitor)
}

struct KeyEntry(i64);

impl<'de> Deserialize<'de> for KeyEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntryVisitor;

        impl Visitor<'_> for EntryVisitor {
            type Value = i64;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an entry point key")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
                Ok(v)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
                i64::try_from(v).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
                parse_key(v.trim()).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(EntryVisitor).map(KeyEntry)
    }
}

/// Decimal, optionally signed, or `0x`-prefixed hexadecimal.
pub fn parse_key(text: &str) -> Result<i64, ConfigError> {
    let invalid = || ConfigError::InvalidKey {
        value: text.to_string(),
    };
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).map_err(|_| invalid())?,
        None => digits.parse::<i64>().map_err(|_| invalid())?,
    };
    Ok(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RuntimeConfig::default();
        assert_eq!(config.pause_signal().unwrap(), Signal::SIGUSR1);
        assert_eq!(config.init_trigger, InitTrigger::SdlInit);
        assert!(config.summary_on_exit);
        assert!(config.interest_keys.is_empty());
    }

    #[test]
    fn signal_names_with_and_without_prefix() {
        assert_eq!(parse_pause_signal("SIGUSR2").unwrap(), Signal::SIGUSR2);
        assert_eq!(parse_pause_signal("usr2").unwrap(), Signal::SIGUSR2);
        assert!(matches!(
            parse_pause_signal("SIGNOPE"),
            Err(ConfigError::UnknownSignal { .. })
        ));
        assert!(matches!(
            parse_pause_signal("KILL"),
            Err(ConfigError::UncatchableSignal { .. })
        ));
    }

    #[test]
    fn keys_accept_hex_and_sign() {
        assert_eq!(parse_key("-557").unwrap(), -557);
        assert_eq!(parse_key("0x50").unwrap(), 80);
        assert_eq!(parse_key("-0x10").unwrap(), -16);
        assert!(parse_key("eighty").is_err());
    }

    #[test]
    fn toml_file_shape() {
        let config: RuntimeConfig = toml::from_str(
            r#"
                interest-keys = [-557, 80]
                init-trigger = "load"

                [[pid-overrides]]
                library = "libhl.so"
                pid = 1234

                [log]
                level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.interest_keys, vec![-557, 80]);
        assert_eq!(config.init_trigger, InitTrigger::Load);
        assert_eq!(config.pause_signal, "SIGUSR1");
        assert_eq!(config.log.level, lockstep_logging::LogLevel::Debug);
        assert_eq!(config.pid_override_for("/opt/game/libhl.so"), Some(1234));
        assert_eq!(config.pid_override_for("/usr/lib/libc.so.6"), None);
    }

    #[test]
    fn empty_override_library_is_rejected() {
        let config = RuntimeConfig {
            pid_overrides: vec![PidOverride {
                library: String::new(),
                pid: 1,
            }],
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyPidOverride { pid: 1 })
        ));
    }
}
