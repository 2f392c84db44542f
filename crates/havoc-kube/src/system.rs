//! The kubernetes system: configuration, desired-state capture and
//! validation.

use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use havoc_core::{Identifier, Identifiers, System};
use havoc_wait::{Backoff, MinMaxBackoff};
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::DynamicObject;
use kube::discovery::{self, Scope};
use kube::Client;
use serde_yaml::Mapping;
use tracing::{debug, warn};

use crate::equality::is_equal;
use crate::resources::{parse_resources, ResourceIdentifier};

const KUBECONFIG_KEY: &str = "kubeconfig";
const INCLUSTER_KEY: &str = "incluster";
const RESOURCES_KEY: &str = "resources";

/// A kubernetes system comprising the resources named in the input
/// configuration. The desired-state snapshot is captured by `load` and kept
/// behind a lock so validation and the scenario provider can read it
/// through a shared reference.
pub struct KubeSystem {
    kubeconfig: Option<PathBuf>,
    in_cluster: bool,
    client: Option<Client>,
    resource_identifiers: Vec<ResourceIdentifier>,
    state: RwLock<HashMap<ResourceIdentifier, DynamicObject>>,
}

impl KubeSystem {
    pub fn new() -> Self {
        Self {
            kubeconfig: None,
            in_cluster: false,
            client: None,
            resource_identifiers: Vec::new(),
            state: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn client(&self) -> Result<Client> {
        self.client
            .clone()
            .context("kubernetes client is not initialised")
    }

    /// Resolves the dynamic API for one resource kind, honoring its scope.
    pub(crate) async fn dynamic_api(
        &self,
        identifier: &ResourceIdentifier,
    ) -> Result<Api<DynamicObject>> {
        let client = self.client()?;
        let gvk = identifier.gvk();

        let (api_resource, capabilities) = discovery::pinned_kind(&client, &gvk)
            .await
            .with_context(|| format!("failed to discover kind '{}'", identifier.kind))?;

        let api = match capabilities.scope {
            Scope::Cluster => Api::all_with(client, &api_resource),
            Scope::Namespaced if identifier.namespace.is_empty() => {
                Api::default_namespaced_with(client, &api_resource)
            }
            Scope::Namespaced => {
                Api::namespaced_with(client, &identifier.namespace, &api_resource)
            }
        };

        Ok(api)
    }

    async fn create_client(&mut self) -> Result<()> {
        let config = if let Some(path) = &self.kubeconfig {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("failed to read kubeconfig file '{}'", path.display()))?;

            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("failed to create client config from kubeconfig")?
        } else {
            kube::Config::incluster().context("failed to get in-cluster client config")?
        };

        self.client =
            Some(Client::try_from(config).context("failed to create kubernetes client")?);

        Ok(())
    }

    /// Fetches every configured resource, expanding wildcard entries via
    /// List, and returns the captured objects keyed by identity.
    async fn capture(&self) -> Result<Vec<(ResourceIdentifier, DynamicObject)>> {
        let mut captured = Vec::new();

        for identifier in &self.resource_identifiers {
            let api = self.dynamic_api(identifier).await?;

            if !identifier.name.is_empty() {
                let object = api
                    .get(&identifier.name)
                    .await
                    .context("failed to get kubernetes resource")?;
                captured.push((identifier.clone(), object));
                continue;
            }

            let objects = api
                .list(&ListParams::default())
                .await
                .context("failed to list kubernetes resource")?;

            for object in objects.items {
                let expanded = ResourceIdentifier {
                    group: identifier.group.clone(),
                    version: identifier.version.clone(),
                    kind: identifier.kind.clone(),
                    name: object.metadata.name.clone().unwrap_or_default(),
                    namespace: object.metadata.namespace.clone().unwrap_or_default(),
                };
                captured.push((expanded, object));
            }
        }

        Ok(captured)
    }
}

impl Default for KubeSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl System for KubeSystem {
    async fn parse(&mut self, section: &Mapping) -> Result<()> {
        if let Some(value) = section.get(KUBECONFIG_KEY) {
            let path = value
                .as_str()
                .ok_or_else(|| anyhow!("'{KUBECONFIG_KEY}' field should be of type string"))?;
            self.kubeconfig = Some(PathBuf::from(path));
        }

        if let Some(value) = section.get(INCLUSTER_KEY) {
            self.in_cluster = value
                .as_bool()
                .ok_or_else(|| anyhow!("'{INCLUSTER_KEY}' field should be of type bool"))?;
        }

        if self.kubeconfig.is_none() && !self.in_cluster {
            return Err(anyhow!(
                "either '{KUBECONFIG_KEY}' or '{INCLUSTER_KEY}' as true must be specified"
            ));
        }

        if self.kubeconfig.is_some() && self.in_cluster {
            return Err(anyhow!(
                "'{KUBECONFIG_KEY}' and '{INCLUSTER_KEY}' are mutually exclusive"
            ));
        }

        let resources = section
            .get(RESOURCES_KEY)
            .ok_or_else(|| {
                anyhow!("'{RESOURCES_KEY}' field must be defined for kubernetes system")
            })?
            .as_sequence()
            .ok_or_else(|| anyhow!("'{RESOURCES_KEY}' field should be of type array"))?;

        self.resource_identifiers = parse_resources(resources)?;

        self.create_client().await
    }

    async fn load(&self) -> Result<()> {
        let captured = self.capture().await?;

        debug!(resources = captured.len(), "captured desired state");
        self.state.write().unwrap().extend(captured);

        Ok(())
    }

    async fn validate(&self) -> Result<bool> {
        let mut backoff = MinMaxBackoff {
            min: Duration::from_millis(250),
            max: Duration::from_millis(500),
        };

        let snapshot: Vec<(ResourceIdentifier, DynamicObject)> = {
            let state = self.state.read().unwrap();
            state
                .iter()
                .map(|(identifier, object)| (identifier.clone(), object.clone()))
                .collect()
        };

        for (identifier, desired) in snapshot {
            let api = self.dynamic_api(&identifier).await?;
            let actual = api
                .get(&identifier.name)
                .await
                .context("failed to get kubernetes resource")?;

            if !is_equal(&desired, &actual) {
                warn!(
                    name = %identifier.name,
                    kind = %identifier.kind,
                    namespace = %identifier.namespace,
                    "resource didn't reach desired state"
                );
                return Ok(false);
            }

            // Pace the per-resource fetches to avoid hammering the API
            // server.
            tokio::time::sleep(backoff.step()).await;
        }

        Ok(true)
    }

    fn identifiers(&self) -> Identifiers {
        self.state
            .read()
            .unwrap()
            .keys()
            .map(|identifier| Arc::new(identifier.clone()) as Arc<dyn Identifier>)
            .collect()
    }

    async fn as_json(&self, reload: bool) -> Result<Vec<u8>> {
        if reload {
            self.load()
                .await
                .context("failed to get json representation of system")?;
        }

        let objects: Vec<DynamicObject> = {
            let state = self.state.read().unwrap();
            state.values().cloned().collect()
        };

        Ok(serde_json::to_vec(&objects)?)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
