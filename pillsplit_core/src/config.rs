//! Configuration file support for pillsplit.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/pillsplit/config.toml`.
//! Nothing in the engine reads it directly: the CLI turns it into
//! [`Household`] and [`RefillPolicy`] values and passes those in.

use crate::custody::ParentMatchers;
use crate::{Error, ParentId, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub household: HouseholdConfig,

    #[serde(default)]
    pub refill: RefillConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// One of the two parents.
///
/// `matcher` is the substring that identifies this parent's custody entries
/// in calendar titles. A parent without a matcher only ever receives the
/// uncovered days.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParentConfig {
    pub id: String,
    #[serde(default)]
    pub matcher: Option<String>,
}

/// Who the parents are and whose supply is being tracked
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HouseholdConfig {
    #[serde(default = "default_parents")]
    pub parents: Vec<ParentConfig>,

    /// Parent credited with every morning no custody entry claims
    #[serde(default = "default_mother")]
    pub default_parent: String,

    /// Parent who receives distributions
    #[serde(default = "default_mother")]
    pub target_parent: String,
}

impl Default for HouseholdConfig {
    fn default() -> Self {
        Self {
            parents: default_parents(),
            default_parent: default_mother(),
            target_parent: default_mother(),
        }
    }
}

/// Insurance refill rule parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefillConfig {
    #[serde(default = "default_supply_days")]
    pub supply_days: u32,

    #[serde(default = "default_threshold_percent")]
    pub threshold_percent: f64,
}

impl Default for RefillConfig {
    fn default() -> Self {
        Self {
            supply_days: default_supply_days(),
            threshold_percent: default_threshold_percent(),
        }
    }
}

/// Custody calendar input
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Exported custody events; defaults to `<data_dir>/custody_events.json`
    #[serde(default)]
    pub events_path: Option<PathBuf>,

    /// Extra days classified past the supply window
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            events_path: None,
            lookahead_days: default_lookahead_days(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("pillsplit")
}

fn default_parents() -> Vec<ParentConfig> {
    vec![
        ParentConfig {
            id: "father".into(),
            matcher: Some("Dad".into()),
        },
        ParentConfig {
            id: "mother".into(),
            matcher: None,
        },
    ]
}

fn default_mother() -> String {
    "mother".into()
}

fn default_supply_days() -> u32 {
    30
}

fn default_threshold_percent() -> f64 {
    85.0
}

fn default_lookahead_days() -> u32 {
    14
}

/// Validated household: the two parents, their matchers, and the roles
#[derive(Clone, Debug)]
pub struct Household {
    pub matchers: ParentMatchers,
    pub default_owner: ParentId,
    pub target: ParentId,
    /// The parent who keeps the fill (the one that is not the target)
    pub holder: ParentId,
}

/// Refill rule plus how far past it the schedule should look
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefillPolicy {
    pub supply_days: u32,
    pub threshold_percent: f64,
    pub lookahead_days: u32,
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("pillsplit").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Path of the exported custody calendar
    pub fn events_path(&self, data_dir: &Path) -> PathBuf {
        self.calendar
            .events_path
            .clone()
            .unwrap_or_else(|| data_dir.join("custody_events.json"))
    }

    /// Check the household and refill settings
    ///
    /// Exactly two parents, distinct ids, at least one matcher, and default
    /// and target parents that are among them.
    pub fn validate(&self) -> Result<()> {
        self.household()?;
        self.refill_policy()?;
        Ok(())
    }

    /// Build the validated household description
    pub fn household(&self) -> Result<Household> {
        let parents = &self.household.parents;
        if parents.len() != 2 {
            return Err(Error::Config(format!(
                "exactly two parents must be configured, found {}",
                parents.len()
            )));
        }
        if parents[0].id == parents[1].id {
            return Err(Error::Config(format!(
                "parent ids must differ, both are '{}'",
                parents[0].id
            )));
        }

        let known = |id: &str| parents.iter().any(|p| p.id == id);
        if !known(&self.household.default_parent) {
            return Err(Error::Config(format!(
                "default_parent '{}' is not a configured parent",
                self.household.default_parent
            )));
        }
        if !known(&self.household.target_parent) {
            return Err(Error::Config(format!(
                "target_parent '{}' is not a configured parent",
                self.household.target_parent
            )));
        }

        let matchers = ParentMatchers::new(
            parents
                .iter()
                .filter_map(|p| p.matcher.as_ref().map(|m| (ParentId::new(&p.id), m.clone()))),
        )?;
        if matchers.is_empty() {
            return Err(Error::Config(
                "at least one parent needs a calendar title matcher".into(),
            ));
        }

        let target = ParentId::new(&self.household.target_parent);
        let holder = parents
            .iter()
            .map(|p| ParentId::new(&p.id))
            .find(|p| *p != target)
            .ok_or_else(|| Error::Config("no holder parent configured".into()))?;

        Ok(Household {
            matchers,
            default_owner: ParentId::new(&self.household.default_parent),
            target,
            holder,
        })
    }

    /// Build the validated refill policy
    pub fn refill_policy(&self) -> Result<RefillPolicy> {
        if self.refill.supply_days == 0 {
            return Err(Error::Config("refill.supply_days must be positive".into()));
        }
        let threshold = self.refill.threshold_percent;
        if !(threshold.is_finite() && threshold > 0.0 && threshold <= 100.0) {
            return Err(Error::Config(format!(
                "refill.threshold_percent must be above 0 and at most 100, got {}",
                threshold
            )));
        }
        Ok(RefillPolicy {
            supply_days: self.refill.supply_days,
            threshold_percent: self.refill.threshold_percent,
            lookahead_days: self.calendar.lookahead_days,
        })
    }
}
