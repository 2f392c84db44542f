//! Kubernetes backend plugin.
//!
//! Implements the havoc capability contracts over a live cluster through
//! the dynamic API: the system observes a configured list of resources
//! (with namespace wildcards), the killer deletes them, and validation
//! compares live objects against the desired-state snapshot under semantic
//! equality (labels and status, ignoring timestamps, quantity formatting
//! and condition ordering).

use anyhow::anyhow;
use havoc_core::{Killer, System};

mod destroy;
mod equality;
mod kill;
mod quantity;
mod resources;
mod system;

pub use kill::KubeKiller;
pub use resources::ResourceIdentifier;
pub use system::KubeSystem;

/// Backend type name this plugin registers under.
pub const SYSTEM_TYPE: &str = "kubernetes";

/// Registers the kubernetes system, destroyer and killer with the havoc
/// registry. Called once during program bootstrap.
pub fn register() {
    havoc_core::register_system(SYSTEM_TYPE, || Box::new(KubeSystem::new()) as Box<dyn System>);
    havoc_core::register_destroyer(SYSTEM_TYPE, destroy::parse_destroy_section);
    havoc_core::register_killer(SYSTEM_TYPE, |system| {
        let kube_system = system
            .as_any()
            .downcast::<KubeSystem>()
            .map_err(|_| anyhow!("unsupported system passed to instantiate kubernetes killer"))?;

        Ok(Box::new(KubeKiller::new(kube_system)) as Box<dyn Killer>)
    });
}
