//! Capability contracts implemented by backend plugins.
//!
//! A backend (Kubernetes, a cloud provider, an in-memory test double)
//! participates in chaos runs by implementing [`System`], [`Destroyer`] and
//! [`Killer`] and registering constructors for them in the
//! [`registry`](crate::registry). Readiness checks plug in through
//! [`ReadyCondition`] / [`ReadyParser`].

use std::any::Any;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_yaml::Mapping;

use crate::config::Config;
use crate::identifier::Identifiers;

/// An execution environment chaos is created in.
///
/// A system instance is created by the configuration parser, captures its
/// desired state once during the load phase, and is then shared read-only
/// with killers and ready conditions for the rest of the run. Implementations
/// keep the desired-state snapshot behind interior mutability so `load` can
/// populate it through a shared reference.
#[async_trait]
pub trait System: Send + Sync {
    /// Parses the plugin-specific keys of one `systems` entry.
    async fn parse(&mut self, section: &Mapping) -> Result<()>;

    /// Captures the current live state of the system as its desired state.
    async fn load(&self) -> Result<()>;

    /// Compares the live state against the desired-state snapshot under the
    /// plugin's semantic equality. `Ok(false)` means the system has not yet
    /// converged back; errors mean the comparison itself failed.
    async fn validate(&self) -> Result<bool>;

    /// Identifiers of all resources currently known to the system.
    fn identifiers(&self) -> Identifiers;

    /// JSON representation of the system state, used as policy-evaluation
    /// input. When `reload` is set, the state is re-captured first.
    async fn as_json(&self, reload: bool) -> Result<Vec<u8>>;

    /// Downcast support so killer constructors can reach their concrete
    /// system type.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Parses one subsection of the `destroy` block (an exclusion or a
/// predefined scenario) into the identifiers it names. Stateless.
pub trait Destroyer: Send + Sync {
    fn parse_destroy_section(&self, section: &Mapping) -> Result<Identifiers>;
}

/// Any matching function is a destroyer.
impl<F> Destroyer for F
where
    F: Fn(&Mapping) -> Result<Identifiers> + Send + Sync,
{
    fn parse_destroy_section(&self, section: &Mapping) -> Result<Identifiers> {
        self(section)
    }
}

/// Destroys resources in a live system. What "kill" means is up to the
/// backend: deleting a Kubernetes resource, severing a network link, etc.
#[async_trait]
pub trait Killer: Send + Sync {
    async fn kill(&self, identifiers: &Identifiers) -> Result<()>;
}

/// The condition under which the target systems are considered to be in a
/// baseline state from which chaos may start.
#[async_trait]
pub trait ReadyCondition: Send + Sync + std::fmt::Debug {
    async fn ready(&self) -> Result<bool>;
}

/// Parses a `ready` section of a recognized kind into a [`ReadyCondition`].
///
/// The parser receives the already-populated [`Config`] so conditions can
/// resolve the systems they observe.
pub trait ReadyParser: Send + Sync {
    fn parse(&self, config: &Config, ready_section: &Mapping) -> Result<Arc<dyn ReadyCondition>>;
}
