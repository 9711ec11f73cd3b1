//! Loading and validation of settings.
//!
//! Values defined in the configuration file can be overridden by environment variables. An
//! example of a configuration file can be found in the `configs/` directory located in the
//! repository root.

use std::{fmt, path::Path};

use config::{Config, ConfigError, Environment};
use serde::{
    de::{self, Deserializer, Visitor},
    Deserialize,
};
use thiserror::Error;
use tracing_subscriber::filter::EnvFilter;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    attack::Attack,
    loader::SyntheticLoader,
    partition::{DistributionType, PartitionError, Policy},
    root::{RootSetParams, RootSize},
};

#[derive(Error, Debug)]
/// An error related to loading and validation of settings.
pub enum SettingsError {
    #[error("configuration loading failed: {0}")]
    Loading(#[from] ConfigError),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

#[derive(Debug, Validate, Deserialize)]
#[validate(schema(function = "validate_settings"))]
/// The combined settings.
///
/// Each section in the configuration file corresponds to the identically named settings field.
pub struct Settings {
    pub log: LoggingSettings,
    #[validate]
    pub dataset: DatasetSettings,
    #[validate]
    pub partition: PartitionSettings,
    #[validate]
    pub root: RootSettings,
    pub attack: AttackSettings,
}

impl Settings {
    /// Loads and validates the settings via a configuration file.
    ///
    /// # Errors
    /// Fails when the loading of the configuration file or its validation failed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let settings: Settings = Self::load(path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Config::new();
        config.merge(config::File::from(path.as_ref()))?;
        config.merge(Environment::with_prefix("xaynet_datasim").separator("__"))?;
        config.try_into()
    }
}

/// Checks the settings across sections.
fn validate_settings(s: &Settings) -> Result<(), ValidationError> {
    if s.attack.malicious_participants <= s.partition.participants {
        Ok(())
    } else {
        Err(ValidationError::new("more malicious participants than participants"))
    }
}

#[derive(Debug, Validate, Deserialize, Clone)]
/// Dataset settings.
pub struct DatasetSettings {
    /// The name of the dataset, one of `MNIST` or `CIFAR10`.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [dataset]
    /// name = "MNIST"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// XAYNET_DATASIM_DATASET__NAME=MNIST
    /// ```
    pub name: String,

    /// The number of training samples per class.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [dataset]
    /// train_per_class = 100
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// XAYNET_DATASIM_DATASET__TRAIN_PER_CLASS=100
    /// ```
    #[validate(range(min = 1))]
    pub train_per_class: usize,

    /// The number of test samples per class.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [dataset]
    /// test_per_class = 20
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// XAYNET_DATASIM_DATASET__TEST_PER_CLASS=20
    /// ```
    pub test_per_class: usize,

    /// The seed of the generated samples.
    #[serde(default)]
    pub seed: u64,
}

impl From<&DatasetSettings> for SyntheticLoader {
    fn from(settings: &DatasetSettings) -> Self {
        Self {
            train_per_class: settings.train_per_class,
            test_per_class: settings.test_per_class,
            seed: settings.seed,
        }
    }
}

#[derive(Debug, Validate, Deserialize, Clone, Copy)]
#[validate(schema(function = "validate_partition"))]
/// Partitioning settings.
pub struct PartitionSettings {
    /// The number of participants.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [partition]
    /// participants = 10
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// XAYNET_DATASIM_PARTITION__PARTICIPANTS=10
    /// ```
    #[validate(range(min = 1))]
    pub participants: usize,

    /// The distribution of the data across participants, one of `iid`, `label_skew` or
    /// `dirichlet`.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [partition]
    /// distribution = "dirichlet"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// XAYNET_DATASIM_PARTITION__DISTRIBUTION=dirichlet
    /// ```
    pub distribution: DistributionType,

    /// The probability that a sample goes to a participant preferring its class. Only used by the
    /// `label_skew` distribution. The value must be between `0` and `1`.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [partition]
    /// q = 0.5
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// XAYNET_DATASIM_PARTITION__Q=0.5
    /// ```
    #[validate(range(min = 0.0, max = 1.0))]
    pub q: f64,

    /// The concentration of the `dirichlet` distribution. The value must be positive, lower
    /// values produce more heterogeneous participants.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [partition]
    /// alpha = 0.5
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// XAYNET_DATASIM_PARTITION__ALPHA=0.5
    /// ```
    pub alpha: f64,

    /// The seed of the partitioning.
    #[serde(default)]
    pub seed: u64,
}

impl PartitionSettings {
    /// Gets the validated distribution policy.
    pub fn policy(&self) -> Result<Policy, PartitionError> {
        Policy::new(self.distribution, self.q, self.alpha)
    }

    fn validate_partition(&self) -> Result<(), ValidationError> {
        self.policy()
            .map(|_| ())
            .map_err(|_| ValidationError::new("invalid distribution parameters"))
    }
}

/// A wrapper for validate derive.
fn validate_partition(s: &PartitionSettings) -> Result<(), ValidationError> {
    s.validate_partition()
}

#[derive(Debug, Validate, Deserialize, Clone, Copy)]
/// Root set settings.
pub struct RootSettings {
    /// Whether a root set is selected at all.
    #[serde(default)]
    pub enabled: bool,

    /// Whether the size of the root set is a ratio of the dataset size instead of a fixed number.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [root]
    /// dynamic_size = true
    /// ratio = 0.01
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// XAYNET_DATASIM_ROOT__DYNAMIC_SIZE=true
    /// XAYNET_DATASIM_ROOT__RATIO=0.01
    /// ```
    #[serde(default)]
    pub dynamic_size: bool,

    /// The fixed size of the root set.
    pub size: usize,

    /// The size of the root set relative to the dataset size. The value must be between `0` and
    /// `1`.
    #[validate(range(min = 0.0, max = 1.0))]
    pub ratio: f64,

    /// The class the root set is biased towards.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [root]
    /// bias_class = 0
    /// bias_probability = 0.5
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// XAYNET_DATASIM_ROOT__BIAS_CLASS=0
    /// XAYNET_DATASIM_ROOT__BIAS_PROBABILITY=0.5
    /// ```
    pub bias_class: usize,

    /// The fraction of the root set drawn from the bias class. The value must be between `0` and
    /// `1`.
    #[validate(range(min = 0.0, max = 1.0))]
    pub bias_probability: f64,

    /// The seed of the root set selection.
    #[serde(default)]
    pub seed: u64,
}

impl From<&RootSettings> for RootSetParams {
    fn from(settings: &RootSettings) -> Self {
        let size = if settings.dynamic_size {
            RootSize::Ratio(settings.ratio)
        } else {
            RootSize::Fixed(settings.size)
        };
        Self {
            size,
            bias_class: settings.bias_class,
            bias_probability: settings.bias_probability,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
/// Attack settings.
pub struct AttackSettings {
    /// The number of participants whose shares are poisoned, starting with participant `0`. Set
    /// this to `0` to disable the attack.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [attack]
    /// malicious_participants = 2
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// XAYNET_DATASIM_ATTACK__MALICIOUS_PARTICIPANTS=2
    /// ```
    #[serde(default)]
    pub malicious_participants: usize,

    /// The attack strategy and its parameters.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [attack.kind]
    /// strategy = "targeted"
    /// target_class = 0
    /// target_output = 1
    /// ```
    pub kind: Attack,

    /// The seed of the attack state.
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Deserialize)]
/// Logging settings.
pub struct LoggingSettings {
    /// A comma-separated list of logging directives. More information about logging directives
    /// can be found [here].
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [log]
    /// filter = "info"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// XAYNET_DATASIM_LOG__FILTER=info
    /// ```
    ///
    /// [here]: https://docs.rs/tracing-subscriber/0.2.15/tracing_subscriber/filter/struct.EnvFilter.html#directives
    #[serde(deserialize_with = "deserialize_env_filter")]
    pub filter: EnvFilter,
}

fn deserialize_env_filter<'de, D>(deserializer: D) -> Result<EnvFilter, D::Error>
where
    D: Deserializer<'de>,
{
    struct EnvFilterVisitor;

    impl<'de> Visitor<'de> for EnvFilterVisitor {
        type Value = EnvFilter;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a valid tracing filter directive: https://docs.rs/tracing-subscriber/0.2.15/tracing_subscriber/filter/struct.EnvFilter.html#directives")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            EnvFilter::try_new(value)
                .map_err(|_| de::Error::invalid_value(serde::de::Unexpected::Str(value), &self))
        }
    }

    deserializer.deserialize_str(EnvFilterVisitor)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    impl Default for PartitionSettings {
        fn default() -> Self {
            Self {
                participants: 10,
                distribution: DistributionType::LabelSkew,
                q: 0.5,
                alpha: 0.5,
                seed: 0,
            }
        }
    }

    impl Default for RootSettings {
        fn default() -> Self {
            Self {
                enabled: true,
                dynamic_size: false,
                size: 100,
                ratio: 0.01,
                bias_class: 0,
                bias_probability: 0.5,
                seed: 0,
            }
        }
    }

    #[test]
    #[serial]
    fn test_settings_new() {
        let settings = Settings::new("configs/config.toml").unwrap();
        assert_eq!(settings.dataset.name, "MNIST");
        assert_eq!(settings.partition.participants, 10);
        assert_eq!(settings.partition.distribution, DistributionType::LabelSkew);
        assert!(Settings::new("").is_err());
    }

    #[test]
    fn test_validate_partition() {
        assert!(PartitionSettings::default().validate().is_ok());
        assert!(PartitionSettings {
            participants: 0,
            ..PartitionSettings::default()
        }
        .validate()
        .is_err());
        assert!(PartitionSettings {
            q: 1. + f64::EPSILON,
            ..PartitionSettings::default()
        }
        .validate()
        .is_err());
        assert!(PartitionSettings {
            distribution: DistributionType::Dirichlet,
            alpha: 0.,
            ..PartitionSettings::default()
        }
        .validate()
        .is_err());

        // alpha is irrelevant for label skew
        assert!(PartitionSettings {
            alpha: 0.,
            ..PartitionSettings::default()
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_partition_policy() {
        assert_eq!(
            PartitionSettings::default().policy(),
            Ok(Policy::LabelSkew { q: 0.5 })
        );
    }

    #[test]
    fn test_validate_root() {
        assert!(RootSettings::default().validate().is_ok());
        assert!(RootSettings {
            bias_probability: -0.1,
            ..RootSettings::default()
        }
        .validate()
        .is_err());
        assert!(RootSettings {
            ratio: 1.5,
            ..RootSettings::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_root_params() {
        let params = RootSetParams::from(&RootSettings::default());
        assert_eq!(params.size, RootSize::Fixed(100));

        let params = RootSetParams::from(&RootSettings {
            dynamic_size: true,
            ..RootSettings::default()
        });
        assert_eq!(params.size, RootSize::Ratio(0.01));
    }

    #[test]
    #[serial]
    fn test_settings_env_overrides_toml() {
        std::env::set_var("XAYNET_DATASIM_PARTITION__PARTICIPANTS", "4");
        std::env::set_var("XAYNET_DATASIM_PARTITION__DISTRIBUTION", "dirichlet");
        let settings = Settings::new("configs/config.toml");
        std::env::remove_var("XAYNET_DATASIM_PARTITION__PARTICIPANTS");
        std::env::remove_var("XAYNET_DATASIM_PARTITION__DISTRIBUTION");

        let settings = settings.unwrap();
        assert_eq!(settings.partition.participants, 4);
        assert_eq!(
            settings.partition.policy(),
            Ok(Policy::Dirichlet { alpha: 0.5 })
        );
    }

    #[test]
    #[serial]
    fn test_validate_malicious_participants() {
        let mut settings = Settings::new("configs/config.toml").unwrap();
        settings.attack.malicious_participants = settings.partition.participants + 1;
        assert!(settings.validate().is_err());
    }
}
