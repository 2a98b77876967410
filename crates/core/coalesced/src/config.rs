use std::time::Duration;

use inflight_config::Coalescing;

use crate::hooks::EVENT_COLLAPSED;

#[derive(Clone, PartialEq, Eq, Debug)]
/// Config values for [`CoalescionService`](crate::CoalescionService).
pub struct CoalescionServiceConfig {
    /// How long a successful outcome keeps being served after it settles
    pub collapsing_window: Duration,
    /// Suffix of the collapse event, emitted as `collapsed-<event_name>`
    pub event_name: Option<String>,
}

impl CoalescionServiceConfig {
    /// Config with the given retention window and no event name
    pub fn with_window(collapsing_window: Duration) -> Self {
        Self {
            collapsing_window,
            ..Self::default()
        }
    }

    /// Name of the event emitted whenever a caller joins an existing operation
    pub fn event(&self) -> String {
        match &self.event_name {
            Some(name) => format!("{EVENT_COLLAPSED}-{name}"),
            None => EVENT_COLLAPSED.to_string(),
        }
    }

    /// Read the `[coalescing]` section of the layered configuration
    pub async fn load() -> Result<Self, inflight_config::Error> {
        let settings = inflight_config::config().await?;
        Ok(Self::from(&settings.coalescing))
    }
}

impl Default for CoalescionServiceConfig {
    fn default() -> Self {
        Self {
            collapsing_window: Duration::ZERO,
            event_name: None,
        }
    }
}

impl From<&Coalescing> for CoalescionServiceConfig {
    fn from(section: &Coalescing) -> Self {
        Self {
            collapsing_window: section.window(),
            event_name: section.event_name.clone(),
        }
    }
}
