//! Configuration loading.
//!
//! Sources, later ones winning: built-in defaults, `config/default.toml`
//! (optional), then `FANHUB_`-prefixed environment variables using `__` as
//! the section separator (`FANHUB_SERVER__PORT=9000`). List values such as
//! `FANHUB_BROKER__ALLOWED_ORIGINS` are comma separated.

mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{BrokerSettings, LogSettings, ServerSettings, Settings};

pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("FANHUB")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("broker.allowed_origins")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    let server = partial.server;
    let broker = partial.broker;
    let log = partial.log;

    Ok(Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            path: server
                .as_ref()
                .and_then(|s| s.path.clone())
                .unwrap_or(default.server.path),
        },
        broker: BrokerSettings {
            allowed_origins: broker
                .as_ref()
                .and_then(|b| b.allowed_origins.clone())
                .filter(|origins| !origins.is_empty())
                .unwrap_or(default.broker.allowed_origins),
            client_queue_capacity: broker
                .as_ref()
                .and_then(|b| b.client_queue_capacity)
                .unwrap_or(default.broker.client_queue_capacity),
            hub_capacity: broker
                .as_ref()
                .and_then(|b| b.hub_capacity)
                .unwrap_or(default.broker.hub_capacity),
        },
        log: LogSettings {
            level: log
                .and_then(|l| l.level)
                .unwrap_or(default.log.level),
        },
    })
}
