//! Resource deletion for chaos scenarios.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use havoc_core::{Identifiers, Killer};
use kube::api::DeleteParams;
use tracing::debug;

use crate::resources::ResourceIdentifier;
use crate::system::KubeSystem;

/// Deletes kubernetes resources. Deleting an already-absent resource or an
/// unknown kind counts as success, so kills are idempotent.
pub struct KubeKiller {
    system: Arc<KubeSystem>,
}

impl KubeKiller {
    pub fn new(system: Arc<KubeSystem>) -> Self {
        Self { system }
    }
}

#[async_trait]
impl Killer for KubeKiller {
    async fn kill(&self, identifiers: &Identifiers) -> Result<()> {
        for identifier in identifiers {
            let resource = identifier
                .as_any()
                .downcast_ref::<ResourceIdentifier>()
                .ok_or_else(|| anyhow!("unsupported identifier passed to kubernetes killer"))?;

            let api = match self.system.dynamic_api(resource).await {
                Ok(api) => api,
                // The kind no longer exists in the cluster; nothing left to
                // delete.
                Err(err) if is_not_found(&err) => {
                    debug!(kind = %resource.kind, "kind not found while killing, skipping");
                    continue;
                }
                Err(err) => return Err(err),
            };

            match api.delete(&resource.name, &DeleteParams::default()).await {
                Ok(_) => {}
                Err(kube::Error::Api(response)) if response.code == 404 => {
                    debug!(name = %resource.name, "resource already gone while killing");
                }
                Err(err) => {
                    return Err(err).context("failed to delete kubernetes resource");
                }
            }
        }

        Ok(())
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<kube::Error>(),
        Some(kube::Error::Api(response)) if response.code == 404
    )
}
