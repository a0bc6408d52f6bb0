//! TOML configuration for the engine.
//!
//! Read from `--config <path>` or the platform-appropriate config file:
//! - Windows:  `%APPDATA%\MultiWindowPilot\config.toml`
//! - Linux:    `~/.config/multiwindow-pilot/config.toml`
//! - macOS:    `~/Library/Application Support/MultiWindowPilot/config.toml`
//!
//! # Example (for beginners)
//!
//! ```toml
//! [engine]
//! stop_hotkey = "ctrl+q"
//!
//! [windows]
//! process_names = ["game.exe"]
//! title_keywords = ["MyGame"]
//!
//! [combat]
//! movement_radius = 150
//! attack_keys = ["1", "2", "mouseright"]
//! area = { min_x = 0.2, min_y = 0.2, max_x = 0.8, max_y = 0.8 }
//!
//! [detection]
//! labels = ["item"]
//! threshold = 0.8
//! service_url = "ws://127.0.0.1:9750"
//! spool_dir = "C:/Temp/mwp-spool"
//! ```
//!
//! Every field has a serde default, so an empty or missing file is a valid
//! configuration.  Durations are whole milliseconds (`*_ms`).
//!
//! [`AppConfig::validate`] rejects values that would parse but make no
//! sense at runtime; [`AppConfig::to_loop_settings`] converts the validated
//! file into the control loop's [`LoopSettings`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use mwp_core::keymap::Hotkey;
use mwp_core::{DetectionCriteria, FractionalRect, HidKeyCode, WindowCriteria};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::combat::AttackBinding;
use crate::application::control_loop::LoopSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The file parsed but a value is unusable.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub windows: WindowsConfig,
    #[serde(default)]
    pub combat: CombatConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub faults: FaultConfig,
    #[serde(default)]
    pub injection: InjectionConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How often the coordinator re-enumerates windows.
    #[serde(default = "default_rescan_interval_ms")]
    pub rescan_interval_ms: u64,
    /// Sleep between two ticks of one control loop.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Detect and publish status, but never inject input.
    #[serde(default)]
    pub observe_only: bool,
    /// Fixed movement seed for reproducible runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
    /// Global chord that stops every loop, e.g. `"ctrl+q"`.  Empty disables it.
    #[serde(default = "default_stop_hotkey")]
    pub stop_hotkey: String,
}

/// Which top-level windows get a control loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowsConfig {
    #[serde(default)]
    pub process_names: Vec<String>,
    #[serde(default)]
    pub title_keywords: Vec<String>,
    #[serde(default = "default_min_width")]
    pub min_width: u32,
    #[serde(default = "default_min_height")]
    pub min_height: u32,
}

/// Fractional combat area, `0.0..=1.0` of the client width/height.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AreaConfig {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Baseline movement and attack cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombatConfig {
    #[serde(default = "default_area")]
    pub area: AreaConfig,
    #[serde(default = "default_movement_radius")]
    pub movement_radius: u32,
    #[serde(default = "default_max_random_moves")]
    pub max_random_moves: u32,
    #[serde(default = "default_movement_interval_ms")]
    pub movement_interval_ms: u64,
    #[serde(default = "default_movement_hold_ms")]
    pub movement_hold_ms: u64,
    #[serde(default = "default_center_return_hold_ms")]
    pub center_return_hold_ms: u64,
    /// Key held during movement clicks; empty for none.
    #[serde(default = "default_movement_modifier")]
    pub movement_modifier: String,
    #[serde(default = "default_attack_interval_ms")]
    pub attack_interval_ms: u64,
    /// Key names (`"1"`, `"f1"`, `"space"`) or `mouseleft`/`mouseright`/`mousemiddle`.
    #[serde(default = "default_attack_keys")]
    pub attack_keys: Vec<String>,
    #[serde(default = "default_attack_move_hold_ms")]
    pub attack_move_hold_ms: u64,
}

/// What to look for and how to react to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionConfig {
    /// Labels that trigger a reaction; empty means any label.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_true")]
    pub early_exit: bool,
    /// `ws://` URL of an `mwp-detect-server`.  Unset means no detector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Where captured frames are written for the detection service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spool_dir: Option<PathBuf>,
    #[serde(default = "default_approach_hold_ms")]
    pub approach_hold_ms: u64,
    #[serde(default = "default_approach_settle_ms")]
    pub approach_settle_ms: u64,
    #[serde(default = "default_pickup_attempts")]
    pub pickup_attempts: u32,
    #[serde(default = "default_pickup_interval_ms")]
    pub pickup_interval_ms: u64,
    #[serde(default = "default_response_step_budget")]
    pub response_step_budget: u32,
    #[serde(default = "default_response_time_budget_ms")]
    pub response_time_budget_ms: u64,
    /// Detections are ignored for this long after a reaction ends.
    #[serde(default = "default_reaction_cooldown_ms")]
    pub reaction_cooldown_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaultConfig {
    /// Consecutive observation failures that fault a loop.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Fault cycles (and crash restarts) before a window is dropped.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    /// Also fault after `failure_threshold` consecutive exhausted injection
    /// chains.
    #[serde(default)]
    pub count_injection_failures: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InjectionConfig {
    /// Permit the last-resort strategy that raises the target window.
    #[serde(default)]
    pub allow_activation: bool,
    /// Timeout of synchronous message delivery.
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
}

/// Simulated windows and detections used by `--dry-run`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    #[serde(default = "default_sim_windows")]
    pub windows: u32,
    #[serde(default = "default_sim_width")]
    pub width: u32,
    #[serde(default = "default_sim_height")]
    pub height: u32,
    /// A simulated detection appears every N observations; 0 disables.
    #[serde(default = "default_sim_detection_every")]
    pub detection_every: u64,
    #[serde(default = "default_sim_detection_label")]
    pub detection_label: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_rescan_interval_ms() -> u64 {
    2_000
}
fn default_tick_interval_ms() -> u64 {
    100
}
fn default_min_width() -> u32 {
    400
}
fn default_min_height() -> u32 {
    300
}
fn default_area() -> AreaConfig {
    AreaConfig {
        min_x: 0.2,
        min_y: 0.2,
        max_x: 0.8,
        max_y: 0.8,
    }
}
fn default_movement_radius() -> u32 {
    150
}
fn default_max_random_moves() -> u32 {
    30
}
fn default_movement_interval_ms() -> u64 {
    2_000
}
fn default_movement_hold_ms() -> u64 {
    500
}
fn default_center_return_hold_ms() -> u64 {
    1_000
}
fn default_movement_modifier() -> String {
    "ctrl".to_string()
}
fn default_attack_interval_ms() -> u64 {
    1_500
}
fn default_attack_keys() -> Vec<String> {
    vec!["mouseright".to_string()]
}
fn default_attack_move_hold_ms() -> u64 {
    300
}
fn default_threshold() -> f32 {
    0.8
}
fn default_true() -> bool {
    true
}
fn default_request_timeout_ms() -> u64 {
    2_000
}
fn default_approach_hold_ms() -> u64 {
    500
}
fn default_approach_settle_ms() -> u64 {
    200
}
fn default_pickup_attempts() -> u32 {
    5
}
fn default_pickup_interval_ms() -> u64 {
    100
}
fn default_response_step_budget() -> u32 {
    16
}
fn default_response_time_budget_ms() -> u64 {
    3_000
}
fn default_reaction_cooldown_ms() -> u64 {
    2_000
}
fn default_stop_hotkey() -> String {
    "ctrl+q".to_string()
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_backoff_ms() -> u64 {
    5_000
}
fn default_max_restarts() -> u32 {
    3
}
fn default_message_timeout_ms() -> u64 {
    200
}
fn default_sim_windows() -> u32 {
    3
}
fn default_sim_width() -> u32 {
    1024
}
fn default_sim_height() -> u32 {
    768
}
fn default_sim_detection_every() -> u64 {
    25
}
fn default_sim_detection_label() -> String {
    "item".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            rescan_interval_ms: default_rescan_interval_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            observe_only: false,
            rng_seed: None,
            stop_hotkey: default_stop_hotkey(),
        }
    }
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            process_names: Vec::new(),
            title_keywords: Vec::new(),
            min_width: default_min_width(),
            min_height: default_min_height(),
        }
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            area: default_area(),
            movement_radius: default_movement_radius(),
            max_random_moves: default_max_random_moves(),
            movement_interval_ms: default_movement_interval_ms(),
            movement_hold_ms: default_movement_hold_ms(),
            center_return_hold_ms: default_center_return_hold_ms(),
            movement_modifier: default_movement_modifier(),
            attack_interval_ms: default_attack_interval_ms(),
            attack_keys: default_attack_keys(),
            attack_move_hold_ms: default_attack_move_hold_ms(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            threshold: default_threshold(),
            early_exit: default_true(),
            service_url: None,
            request_timeout_ms: default_request_timeout_ms(),
            spool_dir: None,
            approach_hold_ms: default_approach_hold_ms(),
            approach_settle_ms: default_approach_settle_ms(),
            pickup_attempts: default_pickup_attempts(),
            pickup_interval_ms: default_pickup_interval_ms(),
            response_step_budget: default_response_step_budget(),
            response_time_budget_ms: default_response_time_budget_ms(),
            reaction_cooldown_ms: default_reaction_cooldown_ms(),
        }
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            backoff_ms: default_backoff_ms(),
            max_restarts: default_max_restarts(),
            count_injection_failures: false,
        }
    }
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            allow_activation: false,
            message_timeout_ms: default_message_timeout_ms(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            windows: default_sim_windows(),
            width: default_sim_width(),
            height: default_sim_height(),
            detection_every: default_sim_detection_every(),
            detection_label: default_sim_detection_label(),
        }
    }
}

// ── Validation and conversion ─────────────────────────────────────────────────

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

impl AppConfig {
    /// Checks values that parse but cannot work at runtime.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detection;
        if !(0.0..=1.0).contains(&d.threshold) {
            return Err(invalid("detection.threshold", format!("{} is outside [0, 1]", d.threshold)));
        }

        let intervals = [
            ("engine.rescan_interval_ms", self.engine.rescan_interval_ms),
            ("engine.tick_interval_ms", self.engine.tick_interval_ms),
            ("combat.movement_interval_ms", self.combat.movement_interval_ms),
            ("combat.attack_interval_ms", self.combat.attack_interval_ms),
            ("detection.request_timeout_ms", d.request_timeout_ms),
            ("detection.response_time_budget_ms", d.response_time_budget_ms),
            ("faults.backoff_ms", self.faults.backoff_ms),
        ];
        if let Some(&(field, _)) = intervals.iter().find(|(_, v)| *v == 0) {
            return Err(invalid(field, "must be greater than zero"));
        }
        if self.faults.failure_threshold == 0 {
            return Err(invalid("faults.failure_threshold", "must be at least 1"));
        }
        if d.response_step_budget == 0 {
            return Err(invalid("detection.response_step_budget", "must be at least 1"));
        }

        let area = self.combat_area()?;
        if !(area.min_x() < 0.5 && 0.5 < area.max_x() && area.min_y() < 0.5 && 0.5 < area.max_y()) {
            return Err(invalid("combat.area", "must contain the window center"));
        }

        self.movement_modifier()?;
        self.attack_bindings()?;
        self.stop_hotkey()?;

        if d.service_url.is_some() {
            if d.labels.is_empty() {
                return Err(invalid("detection.labels", "the detection service needs at least one label"));
            }
            if d.spool_dir.is_none() {
                return Err(invalid("detection.spool_dir", "the detection service reads frames from the spool"));
            }
        }
        Ok(())
    }

    pub fn window_criteria(&self) -> WindowCriteria {
        WindowCriteria {
            process_names: self.windows.process_names.clone(),
            title_keywords: self.windows.title_keywords.clone(),
            min_width: self.windows.min_width,
            min_height: self.windows.min_height,
        }
    }

    pub fn rescan_interval(&self) -> Duration {
        ms(self.engine.rescan_interval_ms)
    }

    pub fn message_timeout(&self) -> Duration {
        ms(self.injection.message_timeout_ms)
    }

    /// The parsed stop hotkey, `None` when disabled.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when the chord does not parse.
    pub fn stop_hotkey(&self) -> Result<Option<Hotkey>, ConfigError> {
        let text = self.engine.stop_hotkey.trim();
        if text.is_empty() {
            return Ok(None);
        }
        Hotkey::parse(text)
            .map(Some)
            .map_err(|e| invalid("engine.stop_hotkey", e.to_string()))
    }

    fn combat_area(&self) -> Result<FractionalRect, ConfigError> {
        let a = self.combat.area;
        FractionalRect::new(a.min_x, a.min_y, a.max_x, a.max_y)
            .map_err(|e| invalid("combat.area", e.to_string()))
    }

    fn movement_modifier(&self) -> Result<Option<HidKeyCode>, ConfigError> {
        let name = self.combat.movement_modifier.trim();
        if name.is_empty() {
            return Ok(None);
        }
        HidKeyCode::from_name(name)
            .map(Some)
            .map_err(|e| invalid("combat.movement_modifier", e.to_string()))
    }

    fn attack_bindings(&self) -> Result<Vec<AttackBinding>, ConfigError> {
        self.combat
            .attack_keys
            .iter()
            .map(|name| AttackBinding::parse(name).map_err(|e| invalid("combat.attack_keys", e.to_string())))
            .collect()
    }

    /// Builds the control-loop settings.
    ///
    /// # Errors
    ///
    /// Anything [`AppConfig::validate`] rejects.
    pub fn to_loop_settings(&self) -> Result<LoopSettings, ConfigError> {
        self.validate()?;
        let c = &self.combat;
        let d = &self.detection;
        let f = &self.faults;
        Ok(LoopSettings {
            tick_interval: ms(self.engine.tick_interval_ms),
            movement_interval: ms(c.movement_interval_ms),
            movement_radius: c.movement_radius,
            max_random_moves: c.max_random_moves,
            combat_area: self.combat_area()?,
            movement_hold: ms(c.movement_hold_ms),
            center_return_hold: ms(c.center_return_hold_ms),
            movement_modifier: self.movement_modifier()?,
            attack_interval: ms(c.attack_interval_ms),
            attack_bindings: self.attack_bindings()?,
            attack_move_hold: ms(c.attack_move_hold_ms),
            criteria: DetectionCriteria {
                labels: d.labels.clone(),
                threshold: d.threshold,
                early_exit: d.early_exit,
            },
            approach_hold: ms(d.approach_hold_ms),
            approach_settle: ms(d.approach_settle_ms),
            pickup_attempts: d.pickup_attempts,
            pickup_interval: ms(d.pickup_interval_ms),
            response_step_budget: d.response_step_budget,
            response_time_budget: ms(d.response_time_budget_ms),
            reaction_cooldown: ms(d.reaction_cooldown_ms),
            failure_threshold: f.failure_threshold,
            fault_backoff: ms(f.backoff_ms),
            max_restarts: f.max_restarts,
            count_injection_failures: f.count_injection_failures,
            allow_activation: self.injection.allow_activation,
            observe_only: self.engine.observe_only,
            rng_seed: self.engine.rng_seed,
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default config file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(platform_config_dir()
        .ok_or(ConfigError::NoPlatformConfigDir)?
        .join("config.toml"))
}

/// Loads the config at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("MultiWindowPilot"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("multiwindow-pilot"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("MultiWindowPilot")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mwp_core::MouseButton;

    #[test]
    fn test_empty_file_yields_valid_defaults() {
        // Arrange / Act
        let cfg: AppConfig = toml::from_str("").unwrap();

        // Assert
        assert_eq!(cfg, AppConfig::default());
        assert!(cfg.validate().is_ok());
        assert!(cfg.detection.early_exit);
    }

    #[test]
    fn test_default_loop_settings_match_config_defaults() {
        let settings = AppConfig::default().to_loop_settings().unwrap();

        assert_eq!(settings.movement_radius, 150);
        assert_eq!(settings.max_random_moves, 30);
        assert_eq!(settings.movement_modifier, Some(HidKeyCode::ControlLeft));
        assert_eq!(settings.attack_bindings, vec![AttackBinding::Mouse(MouseButton::Right)]);
        assert_eq!(settings.fault_backoff, Duration::from_secs(5));
        assert!(settings.criteria.early_exit);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let text = r#"
            [combat]
            attack_keys = ["1", "f2", "mouseleft"]
            movement_modifier = ""
        "#;

        let cfg: AppConfig = toml::from_str(text).unwrap();
        let settings = cfg.to_loop_settings().unwrap();

        assert_eq!(
            settings.attack_bindings,
            vec![
                AttackBinding::Key(HidKeyCode::Digit1),
                AttackBinding::Key(HidKeyCode::F2),
                AttackBinding::Mouse(MouseButton::Left),
            ]
        );
        assert_eq!(settings.movement_modifier, None);
        assert_eq!(settings.movement_radius, 150);
    }

    #[test]
    fn test_stop_hotkey_and_cooldown_defaults() {
        let cfg = AppConfig::default();

        let hotkey = cfg.stop_hotkey().unwrap().unwrap();
        let settings = cfg.to_loop_settings().unwrap();

        assert_eq!(hotkey.keys(), &[HidKeyCode::ControlLeft, HidKeyCode::KeyQ]);
        assert_eq!(settings.reaction_cooldown, Duration::from_secs(2));
    }

    #[test]
    fn test_empty_stop_hotkey_disables_it_and_bad_one_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.engine.stop_hotkey = String::new();
        assert_eq!(cfg.stop_hotkey().unwrap(), None);

        cfg.engine.stop_hotkey = "ctrl+shift".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field: "engine.stop_hotkey", .. })));
    }

    #[test]
    fn test_threshold_outside_unit_range_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.detection.threshold = 1.5;

        let err = cfg.validate().unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { field: "detection.threshold", .. }));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.combat.attack_interval_ms = 0;

        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "combat.attack_interval_ms", .. })
        ));
    }

    #[test]
    fn test_combat_area_must_contain_center() {
        let mut cfg = AppConfig::default();
        cfg.combat.area = AreaConfig { min_x: 0.6, min_y: 0.2, max_x: 0.9, max_y: 0.8 };

        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field: "combat.area", .. })));
    }

    #[test]
    fn test_unknown_attack_key_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.combat.attack_keys = vec!["not-a-key".to_string()];

        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "combat.attack_keys", .. })
        ));
    }

    #[test]
    fn test_detection_service_requires_labels_and_spool() {
        let mut cfg = AppConfig::default();
        cfg.detection.service_url = Some("ws://127.0.0.1:9750".to_string());
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field: "detection.labels", .. })));

        cfg.detection.labels = vec!["item".to_string()];
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field: "detection.spool_dir", .. })));

        cfg.detection.spool_dir = Some(PathBuf::from("spool"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let path = std::env::temp_dir().join(format!("mwp-missing-{}.toml", uuid::Uuid::new_v4()));
        assert_eq!(load_config(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("mwp-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.windows.process_names = vec!["game.exe".to_string()];
        cfg.engine.rng_seed = Some(42);

        // Act
        save_config(&cfg, &path).unwrap();
        let restored = load_config(&path).unwrap();

        // Assert
        assert_eq!(restored, cfg);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        assert!(matches!(
            toml::from_str::<AppConfig>("[engine\nlog_level = 3").map_err(ConfigError::from),
            Err(ConfigError::Parse(_))
        ));
    }
}
