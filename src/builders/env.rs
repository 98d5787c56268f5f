//! Env-file configuration.
//!
//! Reads a dotenv file with `dotenvy`; process environment variables win over
//! file values.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::builders::BullhornConfigBuilder;
use crate::error::{BullhornError, BullhornResult, ConfigurationError};
use crate::types::{rest_url_for_corp, BullhornConfig, CredentialSet, Region};

/// Env keys read and written by the crate.
pub mod keys {
    pub const CLIENT_ID: &str = "CLIENT_ID";
    pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
    pub const USERNAME: &str = "BH_USERNAME";
    pub const PASSWORD: &str = "BH_PASSWORD";
    pub const REGION: &str = "BH_REGION";
    pub const ACCESS_TOKEN: &str = "ACCESS_TOKEN";
    pub const REFRESH_TOKEN: &str = "REFRESH_TOKEN";
    pub const REST_TOKEN: &str = "BH_REST_TOKEN";
    pub const CORP_TOKEN: &str = "CORP_TOKEN";
    pub const REST_URL: &str = "REST_URL";

    /// Keys that must be present to build a [`crate::types::BullhornConfig`].
    pub const REQUIRED: [&str; 4] = [CLIENT_ID, CLIENT_SECRET, USERNAME, PASSWORD];

    pub(crate) const ALL: [&str; 10] = [
        CLIENT_ID,
        CLIENT_SECRET,
        USERNAME,
        PASSWORD,
        REGION,
        ACCESS_TOKEN,
        REFRESH_TOKEN,
        REST_TOKEN,
        CORP_TOKEN,
        REST_URL,
    ];
}

/// Key/value settings merged from an env file and the process environment.
#[derive(Clone, Default)]
pub struct EnvSettings {
    path: Option<PathBuf>,
    values: HashMap<String, String>,
}

impl EnvSettings {
    /// Load `path`, tolerating a missing file, then apply process overrides.
    pub fn load(path: impl AsRef<Path>) -> BullhornResult<Self> {
        let path = path.as_ref();
        let mut values = HashMap::new();

        if path.exists() {
            let entries = dotenvy::from_path_iter(path).map_err(|e| read_failed(path, e))?;
            for entry in entries {
                let (key, value) = entry.map_err(|e| read_failed(path, e))?;
                values.insert(key, value);
            }
        }

        for key in keys::ALL {
            if let Ok(value) = std::env::var(key) {
                values.insert(key.to_string(), value);
            }
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            values,
        })
    }

    /// Settings from an in-memory map, no process overrides.
    pub fn from_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            path: None,
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Region, defaulting to EMEA when unset.
    pub fn region(&self) -> BullhornResult<Region> {
        self.get(keys::REGION)
            .map(str::parse::<Region>)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    /// Builder pre-filled from these settings.
    pub fn config_builder(&self) -> BullhornResult<BullhornConfigBuilder> {
        let mut builder = BullhornConfigBuilder::new().region(self.region()?);
        if let Some(v) = self.get(keys::CLIENT_ID) {
            builder = builder.client_id(v);
        }
        if let Some(v) = self.get(keys::CLIENT_SECRET) {
            builder = builder.client_secret(v);
        }
        if let Some(v) = self.get(keys::USERNAME) {
            builder = builder.username(v);
        }
        if let Some(v) = self.get(keys::PASSWORD) {
            builder = builder.password(v);
        }
        if let Some(path) = &self.path {
            builder = builder.env_file(path.clone());
        }
        Ok(builder)
    }

    /// Configuration built from these settings.
    pub fn config(&self) -> BullhornResult<BullhornConfig> {
        self.config_builder()?.build()
    }

    /// Stored credentials, or `None` when the file does not hold a usable
    /// set yet. `ACCESS_TOKEN` may be blank; the session token is what REST
    /// calls use.
    pub fn credentials(&self, rest_host: &str) -> Option<CredentialSet> {
        let refresh = self.get(keys::REFRESH_TOKEN)?;
        let session = self.get(keys::REST_TOKEN)?;
        let rest_url = match self.get(keys::REST_URL) {
            Some(url) => url.to_string(),
            None => rest_url_for_corp(rest_host, self.get(keys::CORP_TOKEN)?),
        };

        Some(CredentialSet::new(
            self.get(keys::ACCESS_TOKEN).unwrap_or_default(),
            refresh,
            session,
            rest_url,
        ))
    }
}

impl BullhornConfig {
    /// Load configuration from a dotenv file plus process overrides.
    pub fn from_env_file(path: impl AsRef<Path>) -> BullhornResult<Self> {
        EnvSettings::load(path)?.config()
    }
}

fn read_failed(path: &Path, error: dotenvy::Error) -> BullhornError {
    BullhornError::Configuration(ConfigurationError::ReadFailed {
        path: path.display().to_string(),
        message: error.to_string(),
    })
}
