//! Declarative configuration model and parser.
//!
//! The input document has three top-level sections: `systems` (the backends
//! chaos is created in), `ready` (the condition gating the run) and
//! `destroy` (exclusions plus the scenarios to execute). Plugin-defined keys
//! inside those sections are delegated to the registered plugin parsers, so
//! the document is navigated dynamically as [`serde_yaml::Value`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

use crate::registry;
use crate::scenario::{Scenario, ScenarioProvider};
use crate::system::{ReadyCondition, System};

const SYSTEMS_KEY: &str = "systems";
const SYSTEM_KEY: &str = "system";
const NAME_KEY: &str = "name";
const TYPE_KEY: &str = "type";
const READY_KEY: &str = "ready";
const DESTROY_KEY: &str = "destroy";
const SCENARIOS_KEY: &str = "scenarios";
const EXCLUSIONS_KEY: &str = "exclusions";
const RANDOM_KEY: &str = "random";
const MIN_RESOURCES_KEY: &str = "minResources";
const MAX_RESOURCES_KEY: &str = "maxResources";
const TIMEOUT_KEY: &str = "timeout";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DEFAULT_MIN_RESOURCES: i64 = 1;
const DEFAULT_MAX_RESOURCES: i64 = 5;

/// Errors produced while parsing the input configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to unmarshal configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("'{0}' section is not defined")]
    MissingSection(&'static str),

    #[error("'{section}' section should be of type {expected}")]
    SectionType {
        section: &'static str,
        expected: &'static str,
    },

    #[error("'{field}' field is mandatory in {context}")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },

    #[error("'{field}' field should be of type {expected}")]
    FieldType {
        field: String,
        expected: &'static str,
    },

    #[error("failed to parse duration for field '{field}': {source}")]
    Duration {
        field: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("unidentified system type '{0}'")]
    UnknownSystemType(String),

    #[error("system '{name}' referenced in {context} is not defined")]
    UnknownSystem { name: String, context: &'static str },

    #[error("destroyer not available for system '{system}' of type '{system_type}'")]
    NoDestroyer { system: String, system_type: String },

    #[error("unidentified ready section")]
    UnknownReadySection,

    #[error("'{SCENARIOS_KEY}' list must not be empty")]
    EmptyScenarios,

    #[error(
        "random scenario for system '{system}' requires \
         '{MIN_RESOURCES_KEY}' >= 1 and '{MAX_RESOURCES_KEY}' > '{MIN_RESOURCES_KEY}'"
    )]
    InvalidRandomBounds { system: String },

    #[error("failed to parse system '{name}' of type '{system_type}': {source}")]
    System {
        name: String,
        system_type: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to parse ready section using '{kind}' ready parser: {source}")]
    Ready {
        kind: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to parse {what} for system '{system}' of type '{system_type}': {source}")]
    Destroy {
        what: &'static str,
        system: String,
        system_type: String,
        #[source]
        source: anyhow::Error,
    },
}

/// The parsed input configuration of one chaos run.
///
/// Created empty by [`Config::new`], populated exactly once by
/// [`Config::parse`], read-only afterward.
#[derive(Default)]
pub struct Config {
    pub(crate) ready: Option<Arc<dyn ReadyCondition>>,
    pub(crate) ready_timeout: Duration,
    pub(crate) systems: HashMap<String, Arc<dyn System>>,
    pub(crate) system_types: HashMap<String, String>,
    pub(crate) scenario_providers: HashMap<String, ScenarioProvider>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// The system registered under `name`, if any. Used by ready-condition
    /// parsers to resolve the system they observe.
    pub fn system(&self, name: &str) -> Option<Arc<dyn System>> {
        self.systems.get(name).cloned()
    }

    /// Parses the YAML input document and populates this config, resolving
    /// every referenced backend type against the plugin registry.
    pub async fn parse(&mut self, input: &str) -> Result<(), ConfigError> {
        let document: Value = serde_yaml::from_str(input)?;
        let root = document.as_mapping().ok_or(ConfigError::SectionType {
            section: "configuration",
            expected: "map",
        })?;

        let systems = root
            .get(SYSTEMS_KEY)
            .ok_or(ConfigError::MissingSection(SYSTEMS_KEY))?;
        self.parse_systems(systems).await?;

        let ready = root
            .get(READY_KEY)
            .ok_or(ConfigError::MissingSection(READY_KEY))?;
        self.parse_ready(ready)?;

        let destroy = root
            .get(DESTROY_KEY)
            .ok_or(ConfigError::MissingSection(DESTROY_KEY))?;
        self.parse_destroy(destroy)?;

        Ok(())
    }

    async fn parse_systems(&mut self, systems: &Value) -> Result<(), ConfigError> {
        let entries = systems.as_sequence().ok_or(ConfigError::SectionType {
            section: SYSTEMS_KEY,
            expected: "array",
        })?;

        for entry in entries {
            let section = entry.as_mapping().ok_or(ConfigError::SectionType {
                section: SYSTEMS_KEY,
                expected: "array of maps",
            })?;

            let name = str_field(section, NAME_KEY, "system")?.to_string();
            let system_type = str_field(section, TYPE_KEY, "system")?.to_string();

            let ctor = registry::system_ctor(&system_type)
                .ok_or_else(|| ConfigError::UnknownSystemType(system_type.clone()))?;

            let mut system = ctor();
            system
                .parse(section)
                .await
                .map_err(|source| ConfigError::System {
                    name: name.clone(),
                    system_type: system_type.clone(),
                    source,
                })?;

            debug!(system = %name, system_type = %system_type, "parsed system");
            self.systems.insert(name.clone(), Arc::from(system));
            self.system_types.insert(name, system_type);
        }

        Ok(())
    }

    fn parse_ready(&mut self, ready: &Value) -> Result<(), ConfigError> {
        let section = ready.as_mapping().ok_or(ConfigError::SectionType {
            section: READY_KEY,
            expected: "map",
        })?;

        self.ready_timeout =
            opt_duration_field(section, TIMEOUT_KEY)?.unwrap_or(DEFAULT_TIMEOUT);

        // The one recognized key selects the parser; the section's own key
        // order decides when a document carries more than one.
        for (key, _) in section {
            let Some(kind) = key.as_str() else { continue };
            if kind == TIMEOUT_KEY {
                continue;
            }

            let Some(parser) = registry::ready_parser(kind) else {
                continue;
            };

            let condition =
                parser
                    .parse(self, section)
                    .map_err(|source| ConfigError::Ready {
                        kind: kind.to_string(),
                        source,
                    })?;

            self.ready = Some(condition);
            return Ok(());
        }

        Err(ConfigError::UnknownReadySection)
    }

    fn parse_destroy(&mut self, destroy: &Value) -> Result<(), ConfigError> {
        let section = destroy.as_mapping().ok_or(ConfigError::SectionType {
            section: DESTROY_KEY,
            expected: "map",
        })?;

        if let Some(exclusions) = section.get(EXCLUSIONS_KEY) {
            self.parse_exclusions(exclusions)?;
        }

        let scenarios = section
            .get(SCENARIOS_KEY)
            .ok_or(ConfigError::MissingField {
                field: SCENARIOS_KEY,
                context: DESTROY_KEY,
            })?;
        self.parse_scenarios(scenarios)?;

        Ok(())
    }

    fn parse_exclusions(&mut self, exclusions: &Value) -> Result<(), ConfigError> {
        let entries = exclusions.as_sequence().ok_or(ConfigError::SectionType {
            section: EXCLUSIONS_KEY,
            expected: "array",
        })?;

        for entry in entries {
            let section = entry.as_mapping().ok_or(ConfigError::SectionType {
                section: EXCLUSIONS_KEY,
                expected: "array of maps",
            })?;

            let (system_name, system_type) = self.destroy_target(section, "exclusion")?;
            let destroyer = registry::destroyer(&system_type).ok_or_else(|| {
                ConfigError::NoDestroyer {
                    system: system_name.clone(),
                    system_type: system_type.clone(),
                }
            })?;

            let identifiers = destroyer.parse_destroy_section(section).map_err(|source| {
                ConfigError::Destroy {
                    what: "exclusion",
                    system: system_name.clone(),
                    system_type,
                    source,
                }
            })?;

            self.provider(&system_name).exclusions.push(identifiers);
        }

        Ok(())
    }

    fn parse_scenarios(&mut self, scenarios: &Value) -> Result<(), ConfigError> {
        let entries = scenarios.as_sequence().ok_or(ConfigError::SectionType {
            section: SCENARIOS_KEY,
            expected: "array",
        })?;

        if entries.is_empty() {
            return Err(ConfigError::EmptyScenarios);
        }

        for entry in entries {
            let section = entry.as_mapping().ok_or(ConfigError::SectionType {
                section: SCENARIOS_KEY,
                expected: "array of maps",
            })?;

            let (system_name, system_type) = self.destroy_target(section, "scenario")?;

            if section.get(RANDOM_KEY).is_some() {
                self.parse_random_scenario(&system_name, section)?;
                continue;
            }

            let timeout = opt_duration_field(section, TIMEOUT_KEY)?.unwrap_or(DEFAULT_TIMEOUT);

            let destroyer = registry::destroyer(&system_type).ok_or_else(|| {
                ConfigError::NoDestroyer {
                    system: system_name.clone(),
                    system_type: system_type.clone(),
                }
            })?;

            let identifiers = destroyer.parse_destroy_section(section).map_err(|source| {
                ConfigError::Destroy {
                    what: "scenario",
                    system: system_name.clone(),
                    system_type: system_type.clone(),
                    source,
                }
            })?;

            if identifiers.is_empty() {
                return Err(ConfigError::Destroy {
                    what: "scenario",
                    system: system_name,
                    system_type,
                    source: anyhow::anyhow!("scenario must name at least one resource"),
                });
            }

            self.provider(&system_name)
                .predefined_scenarios
                .push(Scenario::new(identifiers, timeout));
        }

        Ok(())
    }

    fn parse_random_scenario(
        &mut self,
        system_name: &str,
        section: &Mapping,
    ) -> Result<(), ConfigError> {
        let random = i64_field(section, RANDOM_KEY)?;
        let timeout = opt_duration_field(section, TIMEOUT_KEY)?.unwrap_or(DEFAULT_TIMEOUT);
        let min_resources =
            opt_i64_field(section, MIN_RESOURCES_KEY)?.unwrap_or(DEFAULT_MIN_RESOURCES);
        let max_resources =
            opt_i64_field(section, MAX_RESOURCES_KEY)?.unwrap_or(DEFAULT_MAX_RESOURCES);

        if random > 0 && (min_resources < 1 || max_resources <= min_resources) {
            return Err(ConfigError::InvalidRandomBounds {
                system: system_name.to_string(),
            });
        }

        let provider = self.provider(system_name);
        provider.random = random;
        provider.min_resources = min_resources;
        provider.max_resources = max_resources;
        provider.random_timeout = timeout;

        Ok(())
    }

    /// Resolves the `system` field of a destroy entry to its (name, type)
    /// pair, requiring the system to be defined.
    fn destroy_target(
        &self,
        section: &Mapping,
        context: &'static str,
    ) -> Result<(String, String), ConfigError> {
        let system_name = str_field(section, SYSTEM_KEY, context)?.to_string();
        let system_type = self
            .system_types
            .get(&system_name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownSystem {
                name: system_name.clone(),
                context,
            })?;

        Ok((system_name, system_type))
    }

    fn provider(&mut self, system_name: &str) -> &mut ScenarioProvider {
        self.scenario_providers
            .entry(system_name.to_string())
            .or_default()
    }
}

fn str_field<'a>(
    section: &'a Mapping,
    field: &'static str,
    context: &'static str,
) -> Result<&'a str, ConfigError> {
    let value = section
        .get(field)
        .ok_or(ConfigError::MissingField { field, context })?;

    value.as_str().ok_or(ConfigError::FieldType {
        field: field.to_string(),
        expected: "string",
    })
}

fn i64_field(section: &Mapping, field: &'static str) -> Result<i64, ConfigError> {
    section
        .get(field)
        .and_then(Value::as_i64)
        .ok_or(ConfigError::FieldType {
            field: field.to_string(),
            expected: "int",
        })
}

fn opt_i64_field(section: &Mapping, field: &'static str) -> Result<Option<i64>, ConfigError> {
    match section.get(field) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or(ConfigError::FieldType {
                field: field.to_string(),
                expected: "int",
            }),
    }
}

fn opt_duration_field(
    section: &Mapping,
    field: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    match section.get(field) {
        None => Ok(None),
        Some(value) => duration_from_value(field, value).map(Some),
    }
}

/// Parses a human-form duration value (`10m`, `1h30s`) out of a YAML value.
pub(crate) fn duration_from_value(field: &str, value: &Value) -> Result<Duration, ConfigError> {
    let literal = value.as_str().ok_or(ConfigError::FieldType {
        field: field.to_string(),
        expected: "string",
    })?;

    humantime::parse_duration(literal).map_err(|source| ConfigError::Duration {
        field: field.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::register_test_system;

    const SAMPLE_CONFIG: &str = r#"
systems:
  - name: testing
    type: test-system
    resources:
      - resource1
      - resource2
      - resource3
      - resource4
ready:
  timeout: 1m
  after: 0s
destroy:
  exclusions:
    - system: testing
      resources:
        - resource1
  scenarios:
    - system: testing
      timeout: 5s
      resources:
        - resource2
    - system: testing
      timeout: 5s
      resources:
        - resource2
        - resource4
    - system: testing
      random: 2
      minResources: 1
      maxResources: 3
"#;

    #[tokio::test]
    async fn parses_sample_configuration() {
        register_test_system();

        let mut config = Config::new();
        config.parse(SAMPLE_CONFIG).await.unwrap();

        assert_eq!(config.systems.len(), 1);
        assert_eq!(config.systems.len(), config.system_types.len());
        assert_eq!(config.system_types["testing"], "test-system");
        assert!(config.ready.is_some());
        assert_eq!(config.ready_timeout, Duration::from_secs(60));

        // Every provider key must name a defined system.
        for name in config.scenario_providers.keys() {
            assert!(config.systems.contains_key(name));
        }

        let provider = &config.scenario_providers["testing"];
        assert_eq!(provider.exclusions.len(), 1);
        assert_eq!(provider.predefined_scenarios.len(), 2);
        assert_eq!(provider.random, 2);
        assert_eq!(provider.min_resources, 1);
        assert_eq!(provider.max_resources, 3);
        assert_eq!(provider.random_timeout, Duration::from_secs(600));
    }

    #[tokio::test]
    async fn ready_timeout_defaults_to_ten_minutes() {
        register_test_system();

        let mut config = Config::new();
        config
            .parse(
                r#"
systems:
  - name: testing
    type: test-system
    resources: [r1]
ready:
  after: 0s
destroy:
  scenarios:
    - system: testing
      resources: [r1]
"#,
            )
            .await
            .unwrap();

        assert_eq!(config.ready_timeout, Duration::from_secs(600));
    }

    #[tokio::test]
    async fn unknown_system_type_is_an_error() {
        register_test_system();

        let mut config = Config::new();
        let err = config
            .parse(
                r#"
systems:
  - name: testing
    type: no-such-backend
ready:
  after: 0s
destroy:
  scenarios: []
"#,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigError::UnknownSystemType(name) if name == "no-such-backend"));
    }

    #[tokio::test]
    async fn missing_system_name_is_an_error() {
        register_test_system();

        let mut config = Config::new();
        let err = config
            .parse(
                r#"
systems:
  - type: test-system
    resources: [r1]
ready:
  after: 0s
destroy:
  scenarios: []
"#,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::MissingField { field: "name", .. }
        ));
    }

    #[tokio::test]
    async fn unrecognized_ready_section_is_an_error() {
        register_test_system();

        let mut config = Config::new();
        let err = config
            .parse(
                r#"
systems:
  - name: testing
    type: test-system
    resources: [r1]
ready:
  timeout: 1m
destroy:
  scenarios:
    - system: testing
      resources: [r1]
"#,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigError::UnknownReadySection));
    }

    #[tokio::test]
    async fn scenario_for_undefined_system_is_an_error() {
        register_test_system();

        let mut config = Config::new();
        let err = config
            .parse(
                r#"
systems:
  - name: testing
    type: test-system
    resources: [r1]
ready:
  after: 0s
destroy:
  scenarios:
    - system: elsewhere
      resources: [r1]
"#,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::UnknownSystem { name, .. } if name == "elsewhere"
        ));
    }

    #[tokio::test]
    async fn empty_scenarios_list_is_an_error() {
        register_test_system();

        let mut config = Config::new();
        let err = config
            .parse(
                r#"
systems:
  - name: testing
    type: test-system
    resources: [r1]
ready:
  after: 0s
destroy:
  scenarios: []
"#,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigError::EmptyScenarios));
    }

    #[tokio::test]
    async fn invalid_duration_names_the_field() {
        register_test_system();

        let mut config = Config::new();
        let err = config
            .parse(
                r#"
systems:
  - name: testing
    type: test-system
    resources: [r1]
ready:
  after: 0s
destroy:
  scenarios:
    - system: testing
      timeout: not-a-duration
      resources: [r1]
"#,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigError::Duration { field, .. } if field == "timeout"));
    }

    #[tokio::test]
    async fn random_bounds_are_validated() {
        register_test_system();

        let mut config = Config::new();
        let err = config
            .parse(
                r#"
systems:
  - name: testing
    type: test-system
    resources: [r1, r2]
ready:
  after: 0s
destroy:
  scenarios:
    - system: testing
      random: 3
      minResources: 2
      maxResources: 2
"#,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidRandomBounds { .. }));
    }

    #[tokio::test]
    async fn random_declaration_does_not_swallow_later_scenarios() {
        register_test_system();

        let mut config = Config::new();
        config
            .parse(
                r#"
systems:
  - name: testing
    type: test-system
    resources: [r1, r2, r3]
ready:
  after: 0s
destroy:
  scenarios:
    - system: testing
      random: 1
      maxResources: 3
    - system: testing
      resources: [r2]
"#,
            )
            .await
            .unwrap();

        let provider = &config.scenario_providers["testing"];
        assert_eq!(provider.random, 1);
        assert_eq!(provider.predefined_scenarios.len(), 1);
    }
}
