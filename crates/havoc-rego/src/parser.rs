//! Parsing of the `rego` ready section.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use havoc_core::{Config, ReadyCondition, ReadyParser};
use serde_yaml::Mapping;

use crate::ready::RegoReady;
use crate::READY_KIND;

const SYSTEM_KEY: &str = "system";
const POLICY_FILE_KEY: &str = "policyFile";
const QUERY_KEY: &str = "query";

/// Parses `ready: { rego: { system, policyFile, query } }` into a
/// [`RegoReady`] condition observing the named system.
pub struct RegoReadyParser;

impl ReadyParser for RegoReadyParser {
    fn parse(&self, config: &Config, ready_section: &Mapping) -> Result<Arc<dyn ReadyCondition>> {
        let rego_section = ready_section
            .get(READY_KIND)
            .ok_or_else(|| anyhow!("field '{READY_KIND}' is not defined"))?
            .as_mapping()
            .ok_or_else(|| anyhow!("field '{READY_KIND}' should be of type map"))?;

        let system_name = required_str(rego_section, SYSTEM_KEY)?;
        let system = config.system(system_name).ok_or_else(|| {
            anyhow!("unidentified system '{system_name}' referenced in readiness validation")
        })?;

        let policy_file = required_str(rego_section, POLICY_FILE_KEY)?;
        let policy = std::fs::read_to_string(policy_file)
            .with_context(|| format!("failed to read policy file '{policy_file}'"))?;

        let query = required_str(rego_section, QUERY_KEY)?;

        Ok(Arc::new(RegoReady::new(query, policy, system)))
    }
}

fn required_str<'a>(section: &'a Mapping, field: &str) -> Result<&'a str> {
    section
        .get(field)
        .ok_or_else(|| anyhow!("field '{field}' is mandatory under '{READY_KIND}'"))?
        .as_str()
        .ok_or_else(|| anyhow!("field '{field}' should be of type string"))
}
