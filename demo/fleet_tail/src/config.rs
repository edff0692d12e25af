use std::fs;
use std::path::Path;

use fleetwatch_core::history::DEFAULT_WINDOW;
use fleetwatch_core::ClientConfig;

/// Configuration for the fleet tail demo
#[derive(Clone, Debug)]
pub struct FleetTailConfig {
    pub client: ClientConfig,
    /// Container to tail; the first listed container when unset
    pub container_id: Option<String>,
    /// Stats samples kept for the sparkline
    pub stats_window: usize,
    /// Print grouped continuation lines under each log record
    pub show_grouped_lines: bool,
}

impl Default for FleetTailConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::from_env(),
            container_id: std::env::var("FLEET_TAIL_CONTAINER")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            stats_window: std::env::var("FLEET_TAIL_WINDOW")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_WINDOW),
            show_grouped_lines: true,
        }
    }
}

impl FleetTailConfig {
    /// Load configuration from a TOML file (path via FLEET_TAIL_CONFIG or ./fleet_tail.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path =
            std::env::var("FLEET_TAIL_CONFIG").unwrap_or_else(|_| "fleet_tail.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(
                target: "fleet_tail",
                path = %path,
                "No TOML config found; using defaults/env"
            );
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => Self::from_toml_str(&s).unwrap_or_else(|e| {
                tracing::warn!(
                    target: "fleet_tail",
                    error = %e,
                    "Failed to parse TOML; using defaults"
                );
                default
            }),
            Err(e) => {
                tracing::warn!(
                    target: "fleet_tail",
                    error = %e,
                    "Failed to read TOML; using defaults"
                );
                default
            }
        }
    }

    /// Overlay a TOML document onto the env defaults
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        let t = toml::from_str::<FleetTailToml>(s)?;
        Ok(t.overlay(Self::default()))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct FleetTailToml {
    pub container_id: Option<String>,
    pub stats_window: Option<usize>,
    pub show_grouped_lines: Option<bool>,
    pub backend: Option<BackendToml>,
}

impl FleetTailToml {
    fn overlay(self, mut base: FleetTailConfig) -> FleetTailConfig {
        if let Some(id) = self.container_id.filter(|s| !s.trim().is_empty()) {
            base.container_id = Some(id);
        }
        if let Some(w) = self.stats_window {
            base.stats_window = w.max(1);
        }
        if let Some(g) = self.show_grouped_lines {
            base.show_grouped_lines = g;
        }
        if let Some(b) = self.backend {
            b.apply(&mut base.client);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct BackendToml {
    pub endpoint: Option<String>,
    pub page_location: Option<String>,
    pub dev_server_port: Option<u16>,
    pub backend_port: Option<u16>,
}

impl BackendToml {
    fn apply(self, c: &mut ClientConfig) {
        if let Some(v) = self.endpoint {
            c.endpoint = Some(v);
        }
        if let Some(v) = self.page_location {
            c.page_location = Some(v);
        }
        if let Some(v) = self.dev_server_port {
            c.dev_server_port = v;
        }
        if let Some(v) = self.backend_port {
            c.backend_port = v;
        }
    }
}
