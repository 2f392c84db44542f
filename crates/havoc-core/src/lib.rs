//! Chaos orchestration core.
//!
//! This crate holds the pieces every havoc run is built from: the plugin
//! capability traits ([`System`], [`Destroyer`], [`Killer`],
//! [`ReadyCondition`]), the process-wide plugin [`registry`], the
//! declarative [`Config`] parser, the per-system scenario provider, and the
//! [`ChaosMaker`] pipeline that drives ready → load → scenario execution
//! while threading results into a `havoc_audit::Reporter`.
//!
//! Backend plugins live in their own crates (e.g. `havoc-kube`) and hook in
//! through [`register_system`], [`register_destroyer`], [`register_killer`]
//! and [`register_ready_parser`] during program bootstrap.

pub mod chaos;
pub mod config;
pub mod hooks;
pub mod identifier;
pub mod ready;
pub mod registry;
pub mod scenario;
pub mod system;
pub mod test_support;

pub use chaos::ChaosMaker;
pub use config::{Config, ConfigError};
pub use hooks::{Hook, HookFn};
pub use identifier::{Id, Identifier, Identifiers};
pub use ready::{After, AfterParser, AllReady, AFTER_READY_KIND};
pub use registry::{
    register_destroyer, register_killer, register_ready_parser, register_system,
};
pub use scenario::{Scenario, ScenarioError};
pub use system::{Destroyer, Killer, ReadyCondition, ReadyParser, System};
