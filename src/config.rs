use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::prefetch::{MAX_DEPTH, MIN_IDLE_TICK, PrefetchConfig};
use crate::provider::remote::HttpSettings;

// ---------------------------------------------------------------------------
// ConfigFile: deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub series_dir: Option<PathBuf>,
    pub prefetch: PrefetchConfigFile,
    pub http: HttpConfigFile,
    pub viewer: ViewerConfigFile,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct PrefetchConfigFile {
    pub lookahead: Option<usize>,
    pub lookbehind: Option<usize>,
    pub idle_tick_ms: Option<u64>,
    /// 0 disables the timeout.
    pub wait_timeout_ms: Option<u64>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct HttpConfigFile {
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ViewerConfigFile {
    pub scroll_step: Option<u32>,
    pub frame_budget_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Config: resolved (all fields concrete)
// ---------------------------------------------------------------------------

pub struct Config {
    pub series_dir: PathBuf,
    pub prefetch: PrefetchConfig,
    pub http: HttpSettings,
    pub viewer: ViewerConfig,
}

pub struct ViewerConfig {
    pub scroll_step: u32,
    pub frame_budget: Duration,
}

impl ConfigFile {
    /// Merge CLI values (overwrites non-None fields).
    pub fn merge_cli(&mut self, lookahead: Option<usize>, lookbehind: Option<usize>) {
        if let Some(v) = lookahead {
            debug!("config: CLI override lookahead={v}");
            self.prefetch.lookahead = lookahead;
        }
        if let Some(v) = lookbehind {
            debug!("config: CLI override lookbehind={v}");
            self.prefetch.lookbehind = lookbehind;
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> Config {
        let wait_timeout = match self.prefetch.wait_timeout_ms.unwrap_or(30_000) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        let config = Config {
            series_dir: self
                .series_dir
                .or_else(|| config_dir().map(|d| d.join("series")))
                .unwrap_or_else(|| PathBuf::from("series")),
            prefetch: PrefetchConfig {
                lookahead: depth("lookahead", self.prefetch.lookahead.unwrap_or(3)),
                lookbehind: depth("lookbehind", self.prefetch.lookbehind.unwrap_or(3)),
                idle_tick: idle_tick(self.prefetch.idle_tick_ms.unwrap_or(1000)),
                wait_timeout,
            },
            http: HttpSettings {
                timeout: Duration::from_millis(self.http.timeout_ms.unwrap_or(15_000)),
                user_agent: self.http.user_agent.unwrap_or_else(|| {
                    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into()
                }),
            },
            viewer: ViewerConfig {
                scroll_step: self.viewer.scroll_step.unwrap_or(3),
                frame_budget: Duration::from_millis(self.viewer.frame_budget_ms.unwrap_or(32)),
            },
        };
        info!(
            "config: resolved series_dir={}, lookahead={}, lookbehind={}, \
             idle_tick={}ms, wait_timeout={:?}, http_timeout={}ms, scroll_step={}, \
             frame_budget={}ms",
            config.series_dir.display(),
            config.prefetch.lookahead,
            config.prefetch.lookbehind,
            config.prefetch.idle_tick.as_millis(),
            config.prefetch.wait_timeout,
            config.http.timeout.as_millis(),
            config.viewer.scroll_step,
            config.viewer.frame_budget.as_millis(),
        );
        config
    }
}

/// Clamp a queue depth into `1..=MAX_DEPTH`.
fn depth(name: &str, value: usize) -> usize {
    let clamped = value.clamp(1, MAX_DEPTH);
    if clamped != value {
        warn!("config: {name}={value} out of range, using {clamped}");
    }
    clamped
}

fn idle_tick(ms: u64) -> Duration {
    let tick = Duration::from_millis(ms);
    if tick < MIN_IDLE_TICK {
        warn!(
            "config: idle_tick_ms={ms} too small, using {}",
            MIN_IDLE_TICK.as_millis()
        );
        return MIN_IDLE_TICK;
    }
    tick
}

/// Resolve the XDG config directory for pageturn.
pub fn config_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("pageturn"))
}

/// Load config file. Returns `ConfigFile::default()` if no file exists.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config() -> anyhow::Result<ConfigFile> {
    let path = match config_dir() {
        Some(d) => d.join("config.toml"),
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            return Ok(ConfigFile::default());
        }
    };
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}
