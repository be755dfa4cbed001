use crate::config::{BrokerConfig, StorageConfig};
use config::{Config, ConfigError, Environment, File, FileFormat};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Object storage access key pair
#[derive(Clone)]
pub struct StorageCredentials {
    pub key_id: String,
    pub secret: String,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Broker endpoint and the three TLS files used for mutual authentication
#[derive(Debug, Clone)]
pub struct BrokerCredentials {
    pub endpoint: String,
    pub port: u16,
    pub root_ca: PathBuf,
    pub private_key: PathBuf,
    pub certificate: PathBuf,
}

impl BrokerCredentials {
    pub fn from_config(config: &BrokerConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            port: config.port,
            root_ca: PathBuf::from(&config.root_ca),
            private_key: PathBuf::from(&config.private_key),
            certificate: PathBuf::from(&config.certificate),
        }
    }

    /// Certificate files that do not exist on disk
    pub fn missing_files(&self) -> Vec<&Path> {
        [&self.root_ca, &self.private_key, &self.certificate]
            .into_iter()
            .map(PathBuf::as_path)
            .filter(|path| !path.exists())
            .collect()
    }
}

/// Everything secret the device needs, loaded once and shared read-only
#[derive(Debug, Clone)]
pub struct Credentials {
    pub storage: Option<StorageCredentials>,
    pub broker: BrokerCredentials,
}

impl Credentials {
    /// Load storage keys from the dotenv-style file and the process environment.
    /// `ACCESS_KEY` and `SECRET_KEY` in the environment override the file.
    pub fn load(storage: &StorageConfig, broker: &BrokerConfig) -> Result<Self, ConfigError> {
        let storage = load_storage_credentials(Path::new(&storage.credentials_file))?;
        let credentials = Self {
            storage,
            broker: BrokerCredentials::from_config(broker),
        };
        credentials.report();
        Ok(credentials)
    }

    /// Names of required settings that are absent
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.storage.is_none() {
            missing.push("ACCESS_KEY/SECRET_KEY".to_string());
        }
        for path in self.broker.missing_files() {
            missing.push(path.display().to_string());
        }
        missing
    }

    fn report(&self) {
        let missing = self.missing();
        if missing.is_empty() {
            info!("All credentials present");
        } else {
            warn!(
                "Credentials missing, affected steps will be skipped: {}",
                missing.join(", ")
            );
        }
    }
}

fn load_storage_credentials(path: &Path) -> Result<Option<StorageCredentials>, ConfigError> {
    debug!("Loading storage credentials from: {}", path.display());

    let settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Ini).required(false))
        .add_source(Environment::default().try_parsing(false))
        .build()?;

    let key_id = non_empty(settings.get_string("access_key").ok());
    let secret = non_empty(settings.get_string("secret_key").ok());

    Ok(match (key_id, secret) {
        (Some(key_id), Some(secret)) => Some(StorageCredentials { key_id, secret }),
        _ => None,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DoorbellConfig;
    use std::io::Write;

    #[test]
    fn test_load_from_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ACCESS_KEY=AKIATEST").unwrap();
        writeln!(file, "SECRET_KEY=shh").unwrap();

        let storage = load_storage_credentials(file.path()).unwrap().unwrap();
        assert_eq!(storage.key_id, "AKIATEST");
        assert_eq!(storage.secret, "shh");
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_storage_credentials(&dir.path().join("absent.env"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_incomplete_pair_is_absent() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ACCESS_KEY=AKIATEST").unwrap();
        writeln!(file, "SECRET_KEY=").unwrap();

        // Only meaningful when the environment does not supply SECRET_KEY
        if std::env::var("SECRET_KEY").is_err() {
            assert!(load_storage_credentials(file.path()).unwrap().is_none());
        }
    }

    #[test]
    fn test_secret_redacted_in_debug() {
        let storage = StorageCredentials {
            key_id: "AKIATEST".to_string(),
            secret: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", storage);
        assert!(rendered.contains("AKIATEST"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_missing_reports_certificates() {
        let config = DoorbellConfig::default();
        let credentials = Credentials {
            storage: None,
            broker: BrokerCredentials {
                root_ca: PathBuf::from("/nonexistent/rootCA.pem"),
                ..BrokerCredentials::from_config(&config.broker)
            },
        };

        let missing = credentials.missing();
        assert!(missing.contains(&"ACCESS_KEY/SECRET_KEY".to_string()));
        assert!(missing.iter().any(|m| m.ends_with("rootCA.pem")));
    }
}
