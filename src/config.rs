use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DoorbellConfig {
    pub device: DeviceConfig,
    pub call: CallConfig,
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
    pub broker: BrokerConfig,
    pub display: DisplayConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeviceConfig {
    /// Device identity, also the meeting room name. Rings are dropped without one.
    pub id: Option<String>,

    /// BCM pin of the PIR motion sensor
    #[serde(default = "default_motion_pin")]
    pub motion_pin: u8,

    /// BCM pin of the doorbell button
    #[serde(default = "default_button_pin")]
    pub button_pin: u8,

    /// Minimum gap between accepted motion edges in seconds
    #[serde(default = "default_motion_debounce")]
    pub motion_debounce_seconds: u64,

    /// Minimum gap between accepted button edges in seconds
    #[serde(default = "default_button_debounce")]
    pub button_debounce_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CallConfig {
    /// Meeting service base URL; the device id is appended as the room
    #[serde(default = "default_call_base_url")]
    pub base_url: String,

    /// Call-launcher program
    #[serde(default = "default_launcher")]
    pub launcher: String,

    /// Arguments placed before the URL
    #[serde(default = "default_launcher_args")]
    pub launcher_args: Vec<String>,

    /// How long a call stays up
    #[serde(default = "default_call_duration")]
    pub duration_seconds: u64,

    /// Wait after SIGTERM so the launcher can release camera and display
    #[serde(default = "default_grace_period")]
    pub grace_period_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Base directory for per-day photo folders
    #[serde(default = "default_photos_path")]
    pub path: String,

    /// Still capture program
    #[serde(default = "default_capture_command")]
    pub command: String,

    /// Video device handed to the capture program
    #[serde(default = "default_capture_device")]
    pub device: String,

    /// Extra arguments placed before the output path
    #[serde(default = "default_capture_args")]
    pub args: Vec<String>,

    /// Delay after capture before the file is assumed complete
    #[serde(default = "default_settle")]
    pub settle_ms: u64,

    /// Upper bound on one capture invocation
    #[serde(default = "default_capture_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Destination bucket for evidence photos
    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Dotenv-style file holding ACCESS_KEY and SECRET_KEY
    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,

    /// Upper bound on one upload
    #[serde(default = "default_upload_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BrokerConfig {
    /// Broker host name
    #[serde(default = "default_broker_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_root_ca")]
    pub root_ca: String,

    #[serde(default = "default_private_key")]
    pub private_key: String,

    #[serde(default = "default_certificate")]
    pub certificate: String,

    /// Requests handed to the MQTT client at a time. Publishes beyond this
    /// wait in the unbounded outbox, so none are dropped while offline.
    #[serde(default = "default_request_channel")]
    pub request_channel_capacity: usize,

    /// Rate at which queued publishes drain after reconnecting
    #[serde(default = "default_drain_hz")]
    pub drain_hz: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DisplayConfig {
    /// Commands run in order to wake the screen
    #[serde(default = "default_power_on_commands")]
    pub power_on_commands: Vec<String>,

    /// Commands run in order to blank the screen
    #[serde(default = "default_power_off_commands")]
    pub power_off_commands: Vec<String>,

    #[serde(default = "default_display_timeout")]
    pub command_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// IANA timezone for ring stamps; local time when unset
    pub timezone: Option<String>,

    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl DoorbellConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("device.motion_pin", default_motion_pin() as i64)?
            .set_default("device.button_pin", default_button_pin() as i64)?
            .set_default(
                "device.motion_debounce_seconds",
                default_motion_debounce() as i64,
            )?
            .set_default(
                "device.button_debounce_seconds",
                default_button_debounce() as i64,
            )?
            .set_default("call.base_url", default_call_base_url())?
            .set_default("call.launcher", default_launcher())?
            .set_default("call.launcher_args", default_launcher_args())?
            .set_default("call.duration_seconds", default_call_duration() as i64)?
            .set_default("call.grace_period_ms", default_grace_period() as i64)?
            .set_default("capture.path", default_photos_path())?
            .set_default("capture.command", default_capture_command())?
            .set_default("capture.device", default_capture_device())?
            .set_default("capture.args", default_capture_args())?
            .set_default("capture.settle_ms", default_settle() as i64)?
            .set_default("capture.timeout_seconds", default_capture_timeout() as i64)?
            .set_default("storage.bucket", default_bucket())?
            .set_default("storage.region", default_region())?
            .set_default("storage.credentials_file", default_credentials_file())?
            .set_default("storage.timeout_seconds", default_upload_timeout() as i64)?
            .set_default("broker.endpoint", default_broker_endpoint())?
            .set_default("broker.port", default_broker_port() as i64)?
            .set_default("broker.client_id", default_client_id())?
            .set_default("broker.topic", default_topic())?
            .set_default("broker.root_ca", default_root_ca())?
            .set_default("broker.private_key", default_private_key())?
            .set_default("broker.certificate", default_certificate())?
            .set_default(
                "broker.request_channel_capacity",
                default_request_channel() as i64,
            )?
            .set_default("broker.drain_hz", default_drain_hz() as i64)?
            .set_default(
                "broker.connect_timeout_seconds",
                default_connect_timeout() as i64,
            )?
            .set_default(
                "broker.operation_timeout_seconds",
                default_operation_timeout() as i64,
            )?
            .set_default("display.power_on_commands", default_power_on_commands())?
            .set_default("display.power_off_commands", default_power_off_commands())?
            .set_default("display.command_timeout_seconds", default_display_timeout() as i64)?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // DOORBELL_CALL__DURATION_SECONDS=45 overrides call.duration_seconds
            .add_source(
                Environment::with_prefix("DOORBELL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: DoorbellConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.motion_pin == self.device.button_pin {
            return Err(ConfigError::Message(
                "Motion and button pins must differ".to_string(),
            ));
        }

        if let Some(id) = &self.device.id {
            if id.trim().is_empty() || id.contains('/') {
                return Err(ConfigError::Message(
                    "Device id must be a non-empty room name without '/'".to_string(),
                ));
            }
        }

        if self.call.duration_seconds == 0 {
            return Err(ConfigError::Message(
                "Call duration_seconds must be greater than 0".to_string(),
            ));
        }

        if self.call.launcher.trim().is_empty() {
            return Err(ConfigError::Message(
                "Call launcher cannot be empty".to_string(),
            ));
        }

        if self.capture.path.is_empty() {
            return Err(ConfigError::Message(
                "Capture path cannot be empty".to_string(),
            ));
        }

        if self.broker.drain_hz == 0 {
            return Err(ConfigError::Message(
                "Broker drain_hz must be greater than 0".to_string(),
            ));
        }

        if self.broker.request_channel_capacity == 0 {
            return Err(ConfigError::Message(
                "Broker request_channel_capacity must be greater than 0".to_string(),
            ));
        }

        if let Some(tz) = &self.system.timezone {
            if tz.parse::<chrono_tz::Tz>().is_err() {
                return Err(ConfigError::Message(format!("Unknown timezone '{}'", tz)));
            }
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Settings that are valid but leave the device unable to place calls
    pub fn readiness_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self
            .device
            .id
            .as_deref()
            .map_or(true, |id| id.trim().is_empty())
        {
            issues.push("device.id is not set; every ring will be rejected".to_string());
        }
        issues
    }

    /// Meeting URL for this device, if it has an identity
    pub fn call_target(&self) -> Option<String> {
        self.device.id.as_ref().map(|id| {
            format!("{}/{}", self.call.base_url.trim_end_matches('/'), id)
        })
    }
}

impl DeviceConfig {
    pub fn motion_debounce(&self) -> Duration {
        Duration::from_secs(self.motion_debounce_seconds)
    }

    pub fn button_debounce(&self) -> Duration {
        Duration::from_secs(self.button_debounce_seconds)
    }
}

impl CallConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl BrokerConfig {
    /// Spacing between queued publishes when draining
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.drain_hz.max(1)))
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for DoorbellConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig {
                id: None,
                motion_pin: default_motion_pin(),
                button_pin: default_button_pin(),
                motion_debounce_seconds: default_motion_debounce(),
                button_debounce_seconds: default_button_debounce(),
            },
            call: CallConfig {
                base_url: default_call_base_url(),
                launcher: default_launcher(),
                launcher_args: default_launcher_args(),
                duration_seconds: default_call_duration(),
                grace_period_ms: default_grace_period(),
            },
            capture: CaptureConfig {
                path: default_photos_path(),
                command: default_capture_command(),
                device: default_capture_device(),
                args: default_capture_args(),
                settle_ms: default_settle(),
                timeout_seconds: default_capture_timeout(),
            },
            storage: StorageConfig {
                bucket: default_bucket(),
                region: default_region(),
                credentials_file: default_credentials_file(),
                timeout_seconds: default_upload_timeout(),
            },
            broker: BrokerConfig {
                endpoint: default_broker_endpoint(),
                port: default_broker_port(),
                client_id: default_client_id(),
                topic: default_topic(),
                root_ca: default_root_ca(),
                private_key: default_private_key(),
                certificate: default_certificate(),
                request_channel_capacity: default_request_channel(),
                drain_hz: default_drain_hz(),
                connect_timeout_seconds: default_connect_timeout(),
                operation_timeout_seconds: default_operation_timeout(),
            },
            display: DisplayConfig {
                power_on_commands: default_power_on_commands(),
                power_off_commands: default_power_off_commands(),
                command_timeout_seconds: default_display_timeout(),
            },
            system: SystemConfig {
                timezone: None,
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_motion_pin() -> u8 {
    4
}
fn default_button_pin() -> u8 {
    15
}
fn default_motion_debounce() -> u64 {
    60
}
fn default_button_debounce() -> u64 {
    5
}

fn default_call_base_url() -> String {
    "http://meet.jit.si".to_string()
}
fn default_launcher() -> String {
    "chromium-browser".to_string()
}
fn default_launcher_args() -> Vec<String> {
    vec!["-kiosk".to_string()]
}
fn default_call_duration() -> u64 {
    30
}
fn default_grace_period() -> u64 {
    1000
}

fn default_photos_path() -> String {
    "./Photos".to_string()
}
fn default_capture_command() -> String {
    "fswebcam".to_string()
}
fn default_capture_device() -> String {
    "/dev/video1".to_string()
}
fn default_capture_args() -> Vec<String> {
    vec!["--no-banner".to_string()]
}
fn default_settle() -> u64 {
    2000
}
fn default_capture_timeout() -> u64 {
    10
}

fn default_bucket() -> String {
    "newtestonlyjpg".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_credentials_file() -> String {
    "cred.env".to_string()
}
fn default_upload_timeout() -> u64 {
    15
}

fn default_broker_endpoint() -> String {
    "localhost".to_string()
}
fn default_broker_port() -> u16 {
    8883
}
fn default_client_id() -> String {
    "RaspberryPi".to_string()
}
fn default_topic() -> String {
    "home/doorbell".to_string()
}
fn default_root_ca() -> String {
    "/home/pi/Project/certs/rootCA.pem".to_string()
}
fn default_private_key() -> String {
    "/home/pi/Project/certs/private.pem.key".to_string()
}
fn default_certificate() -> String {
    "/home/pi/Project/certs/certificate.pem.crt".to_string()
}
fn default_request_channel() -> usize {
    10
}
fn default_drain_hz() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_operation_timeout() -> u64 {
    5
}

fn default_power_on_commands() -> Vec<String> {
    vec!["tvservice -p".to_string(), "xset dpms force on".to_string()]
}
fn default_power_off_commands() -> Vec<String> {
    vec!["tvservice -o".to_string()]
}
fn default_display_timeout() -> u64 {
    5
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DoorbellConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.device.motion_debounce(), Duration::from_secs(60));
        assert_eq!(config.device.button_debounce(), Duration::from_secs(5));
        assert_eq!(config.call.duration(), Duration::from_secs(30));
        assert_eq!(config.broker.topic, "home/doorbell");
        assert_eq!(config.broker.drain_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_missing_identity_flagged() {
        let mut config = DoorbellConfig::default();
        assert_eq!(config.readiness_issues().len(), 1);
        assert!(config.readiness_issues()[0].contains("device.id"));

        config.device.id = Some("  ".to_string());
        assert_eq!(config.readiness_issues().len(), 1);

        config.device.id = Some("PervasiveFive".to_string());
        assert!(config.readiness_issues().is_empty());
    }

    #[test]
    fn test_call_target() {
        let mut config = DoorbellConfig::default();
        assert_eq!(config.call_target(), None);

        config.device.id = Some("PervasiveFive".to_string());
        config.call.base_url = "http://meet.example/".to_string();
        assert_eq!(
            config.call_target().as_deref(),
            Some("http://meet.example/PervasiveFive")
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[device]
id = "FrontDoor"
button_debounce_seconds = 3

[call]
duration_seconds = 45
"#
        )
        .unwrap();

        let config = DoorbellConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.device.id.as_deref(), Some("FrontDoor"));
        assert_eq!(config.device.button_debounce_seconds, 3);
        assert_eq!(config.device.motion_debounce_seconds, 60);
        assert_eq!(config.call.duration_seconds, 45);
        assert_eq!(config.capture.command, "fswebcam");
        assert_eq!(config.display.power_off_commands, vec!["tvservice -o"]);
    }

    #[test]
    fn test_config_validation() {
        let mut config = DoorbellConfig::default();
        config.device.button_pin = config.device.motion_pin;
        assert!(config.validate().is_err());

        config.device.button_pin = 15;
        config.device.id = Some("room/with/slash".to_string());
        assert!(config.validate().is_err());

        config.device.id = Some("PervasiveFive".to_string());
        config.system.timezone = Some("Mars/Olympus_Mons".to_string());
        assert!(config.validate().is_err());

        config.system.timezone = Some("Europe/London".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_print_config_round_trips() {
        let rendered = toml::to_string_pretty(&DoorbellConfig::default()).unwrap();
        let parsed: DoorbellConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.call.launcher, "chromium-browser");
        assert_eq!(parsed.device.id, None);
    }
}
