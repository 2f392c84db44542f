//! Resource identity and the `resources` list parser.

use std::any::Any;
use std::fmt;

use anyhow::{anyhow, Result};
use havoc_core::{Id, Identifier};
use kube::core::GroupVersionKind;
use serde_yaml::Value;

const KUBERNETES_RESOURCE: &str = "havoc:kubernetes-resource";

const API_VERSION_KEY: &str = "apiVersion";
const KIND_KEY: &str = "kind";
const NAME_KEY: &str = "name";
const NAMESPACE_KEY: &str = "namespace";

/// Identifies one kubernetes resource by group/version/kind, namespace and
/// name. An empty name marks a wildcard entry: at load time every resource
/// of that kind in the namespace is observed. Namespace is empty for
/// cluster-scoped resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentifier {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl ResourceIdentifier {
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}, Kind={}, {}/{}",
            self.group, self.version, self.kind, self.namespace, self.name
        )
    }
}

impl Identifier for ResourceIdentifier {
    fn id(&self) -> Id {
        Id::new(format!("{KUBERNETES_RESOURCE}:{self}"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Parses a `resources` list of `{apiVersion, kind, name?, namespace?}`
/// entries.
pub(crate) fn parse_resources(resources: &[Value]) -> Result<Vec<ResourceIdentifier>> {
    resources.iter().map(parse_resource).collect()
}

fn parse_resource(resource: &Value) -> Result<ResourceIdentifier> {
    let section = resource
        .as_mapping()
        .ok_or_else(|| anyhow!("resource defined should be a map type"))?;

    let api_version = required_str(section, API_VERSION_KEY)?;
    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        // Core-group resources carry a bare version.
        None => (String::new(), api_version.to_string()),
    };

    let kind = required_str(section, KIND_KEY)?.to_string();
    let name = optional_str(section, NAME_KEY)?.unwrap_or_default();
    let namespace = optional_str(section, NAMESPACE_KEY)?.unwrap_or_default();

    Ok(ResourceIdentifier {
        group,
        version,
        kind,
        name: name.to_string(),
        namespace: namespace.to_string(),
    })
}

fn required_str<'a>(section: &'a serde_yaml::Mapping, field: &str) -> Result<&'a str> {
    section
        .get(field)
        .ok_or_else(|| anyhow!("'{field}' field is required for kubernetes resource"))?
        .as_str()
        .ok_or_else(|| anyhow!("'{field}' field should be of type string"))
}

fn optional_str<'a>(section: &'a serde_yaml::Mapping, field: &str) -> Result<Option<&'a str>> {
    match section.get(field) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| anyhow!("'{field}' field should be of type string")),
    }
}
