//! Tracing / logging initialisation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level per component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Override per component: crate name → level, e.g. `votestream-client: debug`
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs (true) or human-readable text (false)
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// The `EnvFilter` directive string, e.g. "warn,votestream_client=debug".
    pub fn directives(&self) -> String {
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        let mut directives = self.level.clone();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Install the global subscriber. Call once, before connecting.
///
/// `RUST_LOG`, when set, wins over the config.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // logs go to stderr so stdout stays clean for --json output
    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_include_components() {
        let mut config = LogConfig::default();
        config.level = "info".into();
        config.components.insert("votestream-client".into(), "debug".into());
        config.components.insert("votestream-core".into(), "trace".into());
        assert_eq!(
            config.directives(),
            "info,votestream_client=debug,votestream_core=trace"
        );
    }

    #[test]
    fn default_is_quiet() {
        assert_eq!(LogConfig::default().directives(), "warn");
    }
}
