//! Destroy-section parsing for the kubernetes backend.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use havoc_core::{Identifier, Identifiers};
use serde_yaml::Mapping;

use crate::resources::parse_resources;

const RESOURCES_KEY: &str = "resources";

/// Parses one exclusion or predefined-scenario entry into the kubernetes
/// resources it names.
pub(crate) fn parse_destroy_section(section: &Mapping) -> Result<Identifiers> {
    let resources = section
        .get(RESOURCES_KEY)
        .ok_or_else(|| anyhow!("'{RESOURCES_KEY}' field must be defined for kubernetes system"))?
        .as_sequence()
        .ok_or_else(|| anyhow!("'{RESOURCES_KEY}' field should be of type array"))?;

    let identifiers = parse_resources(resources)?
        .into_iter()
        .map(|identifier| Arc::new(identifier) as Arc<dyn Identifier>)
        .collect();

    Ok(identifiers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_scenario_entry() {
        let section: Mapping = serde_yaml::from_str(
            r#"
system: cluster
timeout: 30s
resources:
  - apiVersion: apps/v1
    kind: Deployment
    name: api
    namespace: prod
  - apiVersion: v1
    kind: Pod
    name: worker-0
    namespace: prod
"#,
        )
        .unwrap();

        let identifiers = parse_destroy_section(&section).unwrap();

        assert_eq!(identifiers.len(), 2);
        assert_eq!(
            identifiers.ids()[0].as_str(),
            "havoc:kubernetes-resource:apps/v1, Kind=Deployment, prod/api"
        );
    }

    #[test]
    fn missing_resources_is_an_error() {
        let section: Mapping = serde_yaml::from_str("system: cluster").unwrap();
        let err = parse_destroy_section(&section).unwrap_err();
        assert!(err.to_string().contains("resources"));
    }
}
