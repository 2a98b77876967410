use std::time::Duration;

use cached::proc_macro::cached;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

pub use config::ConfigError as Error;
#[doc(hidden)]
pub use log;

/// Local override file, read from the working directory when present
const LOCAL_CONFIG: &str = "Inflight.toml";

fn builder() -> ConfigBuilder<config::builder::DefaultState> {
    let mut builder = Config::builder().add_source(File::from_str(
        include_str!("../Inflight.toml"),
        FileFormat::Toml,
    ));

    if std::path::Path::new(LOCAL_CONFIG).exists() {
        builder = builder.add_source(File::new(LOCAL_CONFIG, FileFormat::Toml));
    }

    builder.add_source(
        Environment::with_prefix("INFLIGHT")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Coalescing {
    /// Retention window in milliseconds
    pub collapsing_window: u64,
    pub event_name: Option<String>,
}

impl Coalescing {
    /// Retention window as a [`Duration`]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.collapsing_window)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub coalescing: Coalescing,
}

pub async fn init() -> Result<(), ConfigError> {
    log::info!(":: Inflight Configuration ::\n{:?}", config().await?);
    Ok(())
}

/// Build the layered configuration without deserializing it
pub async fn read() -> Result<Config, ConfigError> {
    builder().build()
}

#[cached(time = 30, result = true)]
pub async fn config() -> Result<Settings, ConfigError> {
    read().await?.try_deserialize::<Settings>()
}

/// Configure logging and common environment variables
pub fn setup_logging() {
    dotenv::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    // Another component may have installed a logger already
    pretty_env_logger::try_init().ok();
}

/// Configure logging for the given component and print its name
#[macro_export]
macro_rules! configure {
    ($component: ident) => {
        $crate::setup_logging();
        $crate::log::info!("Starting {}", stringify!($component));
    };
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{builder, config, init, Settings};

    #[async_std::test]
    async fn it_works() {
        crate::setup_logging();
        init().await.unwrap();
    }

    #[async_std::test]
    async fn defaults_disable_the_window() {
        let settings = config().await.unwrap();
        assert_eq!(settings.coalescing.window(), Duration::ZERO);
    }

    #[test]
    fn embedded_defaults_deserialize() {
        let settings = builder()
            .build()
            .unwrap()
            .try_deserialize::<Settings>()
            .unwrap();

        assert_eq!(settings.coalescing.collapsing_window, 0);
    }

    #[test]
    fn setup_logging_is_idempotent() {
        crate::setup_logging();
        crate::setup_logging();
    }

    #[test]
    fn configure_macro_sets_up_logging() {
        crate::configure!(tests);
        assert!(std::env::var("RUST_LOG").is_ok());
    }
}
