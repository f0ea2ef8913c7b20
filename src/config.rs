use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use nalgebra::Vector3;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

pub const FIXED_SUBSTEP: f32 = 1.0 / 60.0;
pub const SOLVER_ITERATIONS: usize = 3;
pub const MAX_SUBSTEPS: u32 = 3;
pub const TARGET_FPS: u32 = 60;

pub const GRAVITY: [f32; 3] = [0.0, -9.82, 0.0];
pub const FRICTION: f32 = 0.5;
pub const RESTITUTION: f32 = 0.1;

pub const CAPACITY_DESK: usize = 80;
pub const CAPACITY_COMPACT: usize = 50;

pub const SPAWN_HEIGHT: f32 = 5.0;
pub const SPAWN_JITTER: f32 = 1.0;
pub const GLYPH_MASS: f32 = 1.0;

pub const INITIAL_LABEL: &str = "Press Key";
pub const INITIAL_CODE: &str = "3kc";

pub const KEY_CAP_COUNT: usize = 23;
pub const KEY_PRESS_DEPTH: f32 = 0.1;
pub const KEY_PRESS_SECS: f32 = 0.03;

pub const FLOOR_HALF_SIZE: f32 = 10.0;
pub const FLOOR_GRID_STEP: f32 = 0.5;

pub const CONFIG_ENV_VAR: &str = "GLYPHFALL_CONFIG";
pub const VARIANT_ENV_VAR: &str = "GLYPHFALL_VARIANT";
pub const CAPACITY_ENV_VAR: &str = "GLYPHFALL_CAPACITY";
pub const TYPEFACE_ENV_VAR: &str = "GLYPHFALL_TYPEFACE";
pub const SEED_ENV_VAR: &str = "GLYPHFALL_SEED";
pub const EVICTION_ENV_VAR: &str = "GLYPHFALL_EVICTION";
pub const LOG_ENV_VAR: &str = "GLYPHFALL_LOG";
pub const DEFAULT_LOG_FILE: &str = "glyphfall.log";

/// When the working set gets trimmed back to capacity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Evict inside `insert`, so the set never exceeds capacity.
    #[default]
    OnInsert,
    /// Only the once-per-frame check evicts. Several inserts between two
    /// frames can overshoot capacity until later frames catch up.
    PerFrame,
}

impl EvictionPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "on_insert" | "insert" => Some(Self::OnInsert),
            "per_frame" | "frame" => Some(Self::PerFrame),
            _ => None,
        }
    }
}

/// Deployment presets. They only differ in working-set capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    Desk,
    Compact,
}

impl Variant {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "desk" => Some(Self::Desk),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }

    pub fn capacity(self) -> usize {
        match self {
            Variant::Desk => CAPACITY_DESK,
            Variant::Compact => CAPACITY_COMPACT,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Session configuration. Every field has a default, so a JSON config file
/// only needs the keys it wants to change.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub gravity: [f32; 3],
    pub friction: f32,
    pub restitution: f32,
    pub fixed_substep: f32,
    pub solver_iterations: usize,
    pub max_substeps: u32,
    pub capacity: usize,
    pub eviction: EvictionPolicy,
    pub spawn_height: f32,
    pub spawn_jitter: f32,
    pub glyph_mass: f32,
    pub target_fps: u32,
    /// `typeface.json` to shape text with. `None` uses the built-in block face.
    pub typeface: Option<PathBuf>,
    /// Fixed RNG seed for spawn poses and key picks. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            friction: FRICTION,
            restitution: RESTITUTION,
            fixed_substep: FIXED_SUBSTEP,
            solver_iterations: SOLVER_ITERATIONS,
            max_substeps: MAX_SUBSTEPS,
            capacity: CAPACITY_DESK,
            eviction: EvictionPolicy::default(),
            spawn_height: SPAWN_HEIGHT,
            spawn_jitter: SPAWN_JITTER,
            glyph_mass: GLYPH_MASS,
            target_fps: TARGET_FPS,
            typeface: None,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Defaults, then the JSON file named by `GLYPHFALL_CONFIG`, then the
    /// individual environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| env::var(key))
    }

    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let mut config = match lookup(CONFIG_ENV_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(env::VarError::NotPresent) => Self::default(),
            Err(source) => {
                return Err(ConfigError::EnvVar {
                    var: CONFIG_ENV_VAR,
                    source,
                });
            }
        };
        config.apply_env(&lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "config_file_loaded");
        Ok(config)
    }

    fn apply_env<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        if let Some(value) = env_value(lookup, VARIANT_ENV_VAR) {
            match Variant::parse(&value) {
                Some(variant) => self.capacity = variant.capacity(),
                None => warn_invalid(VARIANT_ENV_VAR, &value),
            }
        }
        if let Some(value) = env_value(lookup, CAPACITY_ENV_VAR) {
            match value.trim().parse::<usize>() {
                Ok(capacity) => self.capacity = capacity,
                Err(_) => warn_invalid(CAPACITY_ENV_VAR, &value),
            }
        }
        if let Some(value) = env_value(lookup, TYPEFACE_ENV_VAR) {
            if value.trim().is_empty() {
                warn_invalid(TYPEFACE_ENV_VAR, &value);
            } else {
                self.typeface = Some(PathBuf::from(value));
            }
        }
        if let Some(value) = env_value(lookup, SEED_ENV_VAR) {
            match value.trim().parse::<u64>() {
                Ok(seed) => self.seed = Some(seed),
                Err(_) => warn_invalid(SEED_ENV_VAR, &value),
            }
        }
        if let Some(value) = env_value(lookup, EVICTION_ENV_VAR) {
            match EvictionPolicy::parse(&value) {
                Some(policy) => self.eviction = policy,
                None => warn_invalid(EVICTION_ENV_VAR, &value),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "capacity",
                reason: "must be at least 1",
            });
        }
        if !(self.fixed_substep.is_finite() && self.fixed_substep > 0.0) {
            return Err(ConfigError::Invalid {
                field: "fixed_substep",
                reason: "must be positive and finite",
            });
        }
        if self.solver_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "solver_iterations",
                reason: "must be at least 1",
            });
        }
        if self.max_substeps == 0 {
            return Err(ConfigError::Invalid {
                field: "max_substeps",
                reason: "must be at least 1",
            });
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "gravity",
                reason: "components must be finite",
            });
        }
        if !(self.glyph_mass.is_finite() && self.glyph_mass > 0.0) {
            return Err(ConfigError::Invalid {
                field: "glyph_mass",
                reason: "must be positive and finite",
            });
        }
        if self.target_fps == 0 {
            return Err(ConfigError::Invalid {
                field: "target_fps",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    pub fn gravity(&self) -> Vector3<f32> {
        Vector3::from(self.gravity)
    }
}

fn env_value<F>(lookup: &F, var: &'static str) -> Option<String>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(var) {
        Ok(value) => Some(value),
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                env_var = var,
                error = %err,
                "unable to read env var; keeping config value"
            );
            None
        }
    }
}

fn warn_invalid(var: &'static str, value: &str) {
    warn!(
        env_var = var,
        value = value,
        "invalid env var value; keeping config value"
    );
}
