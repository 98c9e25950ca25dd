use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{FetchError, FetchResult};

use super::{ConfigOverrides, FetcherConfig};

/// Picked up from the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "iqfetch.toml";

/// Conventional variable names, honored without the `IQFETCH_` prefix
const CONVENTIONAL_ENV: &[(&str, &str)] = &[
    ("IQ_SERVER_URL", "server_url"),
    ("IQ_USERNAME", "username"),
    ("IQ_PASSWORD", "password"),
    ("IQ_TOKEN", "token"),
    ("ORGANIZATION_ID", "organization_id"),
    ("OUTPUT_DIR", "output_dir"),
];

/// Keys read verbatim from `IQFETCH_*`; everything else goes through figment's typed parsing
const STRING_KEYS: &[&str] = &["server_url", "username", "password", "token", "organization_id", "output_dir"];

impl FetcherConfig {
    /// Merge every layer and extract; validation is left to the caller
    pub fn load(custom_config: Option<&Path>, overrides: &ConfigOverrides) -> FetchResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Ignoring unreadable .env file: {e}");
            }
        }

        Self::figment(custom_config, overrides)?
            .extract()
            .map_err(|e| FetchError::Config(e.to_string()))
    }

    /// The layered provider chain, lowest priority first
    pub fn figment(custom_config: Option<&Path>, overrides: &ConfigOverrides) -> FetchResult<Figment> {
        tracing::trace!("CONFIG LOAD: Starting");

        let file = match custom_config {
            Some(path) if !path.is_file() => {
                return Err(FetchError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
        };

        let mut figment = Figment::from(Serialized::defaults(FetcherConfig::default()));
        if let Some(path) = &file {
            tracing::debug!("Loading configuration from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        let prefixed: Vec<(String, &str)> = STRING_KEYS
            .iter()
            .map(|key| (format!("IQFETCH_{}", key.to_uppercase()), *key))
            .collect();

        Ok(figment
            .merge(Serialized::globals(verbatim_env(
                CONVENTIONAL_ENV.iter().map(|(var, key)| (*var, *key)),
            )))
            .merge(Env::prefixed("IQFETCH_").ignore(STRING_KEYS).split("__"))
            .merge(Serialized::globals(verbatim_env(
                prefixed.iter().map(|(var, key)| (var.as_str(), *key)),
            )))
            .merge(Serialized::globals(overrides.to_value())))
    }
}

/// Taken verbatim so numeric-looking secrets and ids stay strings
fn verbatim_env<'k>(vars: impl Iterator<Item = (&'k str, &'k str)>) -> BTreeMap<&'k str, String> {
    vars.filter_map(|(var, key)| {
        std::env::var(var)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| (key, value))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Strategy;
    use figment::Jail;

    fn load(jail_config: Option<&str>, overrides: &ConfigOverrides) -> FetchResult<FetcherConfig> {
        FetcherConfig::figment(jail_config.map(Path::new), overrides)?
            .extract()
            .map_err(|e| FetchError::Config(e.to_string()))
    }

    #[test]
    fn test_defaults_without_any_source() {
        Jail::expect_with(|_jail| {
            let config = load(None, &ConfigOverrides::default()).map_err(|e| e.to_string())?;
            assert_eq!(config.workers, 1);
            assert_eq!(config.output_dir, PathBuf::from("raw_reports"));
            assert!(config.server_url.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_conventional_env_names() {
        Jail::expect_with(|jail| {
            jail.set_env("IQ_SERVER_URL", "http://iq:8070");
            jail.set_env("IQ_USERNAME", "admin");
            jail.set_env("IQ_PASSWORD", "12345");
            jail.set_env("ORGANIZATION_ID", "4242");
            let config = load(None, &ConfigOverrides::default()).map_err(|e| e.to_string())?;
            assert_eq!(config.server_url, "http://iq:8070");
            assert_eq!(config.password, "12345");
            assert_eq!(config.organization_id.as_deref(), Some("4242"));
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_string_values_are_not_parsed() {
        Jail::expect_with(|jail| {
            jail.set_env("IQ_PASSWORD", "from-conventional");
            jail.set_env("IQFETCH_PASSWORD", "12345");
            jail.set_env("IQFETCH_ORGANIZATION_ID", "4242");
            jail.set_env("IQFETCH_TOKEN", "true");
            jail.set_env("IQFETCH_PAGE_SIZE", "50");
            let config = load(None, &ConfigOverrides::default()).map_err(|e| e.to_string())?;
            assert_eq!(config.password, "12345");
            assert_eq!(config.organization_id.as_deref(), Some("4242"));
            assert_eq!(config.token, "true");
            assert_eq!(config.page_size, 50);
            Ok(())
        });
    }

    #[test]
    fn test_layer_priority() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                server_url = "http://from-file:8070"
                workers = 2
                strategy = "flatten"

                [retry]
                max_attempts = 7
                "#,
            )?;
            jail.set_env("IQ_SERVER_URL", "http://from-env:8070");
            jail.set_env("IQFETCH_WORKERS", "3");
            jail.set_env("IQFETCH_RETRY__INITIAL_BACKOFF_MS", "50");

            let overrides = ConfigOverrides {
                workers: Some(8),
                ..Default::default()
            };
            let config = load(None, &overrides).map_err(|e| e.to_string())?;
            assert_eq!(config.server_url, "http://from-env:8070");
            assert_eq!(config.workers, 8);
            assert_eq!(config.strategy, Strategy::Flatten);
            assert_eq!(config.retry.max_attempts, 7);
            assert_eq!(config.retry.initial_backoff_ms, 50);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_config_file() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "username = \"reader\"\nstages = [\"build\", \"release\"]")?;
            let config = load(Some("custom.toml"), &ConfigOverrides::default()).map_err(|e| e.to_string())?;
            assert_eq!(config.username, "reader");
            assert_eq!(config.stages, vec!["build", "release"]);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_config_file_is_error() {
        Jail::expect_with(|_jail| {
            let err = load(Some("nope.toml"), &ConfigOverrides::default()).unwrap_err();
            assert!(matches!(err, FetchError::Config(_)));
            Ok(())
        });
    }

    #[test]
    fn test_malformed_value_is_config_error() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "workers = \"many\"")?;
            let err = load(None, &ConfigOverrides::default()).unwrap_err();
            assert!(matches!(err, FetchError::Config(_)));
            Ok(())
        });
    }
}
