//! Reusable test plugins and plugin conformance checks.
//!
//! [`TestSystem`] is a fully in-memory backend registered under the
//! `test-system` type. It backs this crate's own pipeline tests and gives
//! plugin authors a reference implementation; the `validate_*` helpers let
//! a plugin crate check that its `System`/`Destroyer`/`Killer` triple obeys
//! the contracts the pipeline relies on.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_yaml::Mapping;

use crate::identifier::{Id, Identifier, Identifiers};
use crate::ready::{AfterParser, AFTER_READY_KIND};
use crate::registry;
use crate::system::{Destroyer, Killer, System};

/// Backend type name the test plugin registers under.
pub const TEST_SYSTEM_TYPE: &str = "test-system";

/// Identifier of a test resource; the ID is the raw resource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestIdentifier(String);

impl TestIdentifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Identifier for TestIdentifier {
    fn id(&self) -> Id {
        Id::new(self.0.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An in-memory system: a set of declared resources and the currently
/// "live" state. Killing removes resources from the live state; healing
/// restores it to the declared set.
#[derive(Debug, Default)]
pub struct TestSystem {
    resources: Mutex<BTreeMap<String, bool>>,
    state: Mutex<BTreeMap<String, bool>>,
}

impl TestSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// A system pre-populated with the given resource names, without going
    /// through `parse`.
    pub fn with_resources<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let system = Self::new();
        {
            let mut declared = system.resources.lock().unwrap();
            for resource in resources {
                declared.insert(resource.into(), true);
            }
        }
        system
    }

    /// Restores the live state to the declared resources, simulating a
    /// backend that self-heals.
    pub fn heal(&self) {
        let resources = self.resources.lock().unwrap().clone();
        *self.state.lock().unwrap() = resources;
    }

    /// Whether the named resource is currently live.
    pub fn has_live_resource(&self, name: &str) -> bool {
        self.state.lock().unwrap().contains_key(name)
    }
}

#[async_trait]
impl System for TestSystem {
    async fn parse(&mut self, section: &Mapping) -> Result<()> {
        let resources = section
            .get("resources")
            .context("'resources' field is mandatory for test systems")?
            .as_sequence()
            .context("'resources' field should be of type array")?;

        let mut declared = self.resources.lock().unwrap();
        for resource in resources {
            let name = resource
                .as_str()
                .context("test system resources should be strings")?;
            declared.insert(name.to_string(), true);
        }

        Ok(())
    }

    async fn load(&self) -> Result<()> {
        self.heal();
        Ok(())
    }

    async fn validate(&self) -> Result<bool> {
        let resources = self.resources.lock().unwrap();
        let state = self.state.lock().unwrap();
        Ok(*resources == *state)
    }

    fn identifiers(&self) -> Identifiers {
        self.resources
            .lock()
            .unwrap()
            .keys()
            .map(|name| Arc::new(TestIdentifier::new(name.clone())) as Arc<dyn Identifier>)
            .collect()
    }

    async fn as_json(&self, reload: bool) -> Result<Vec<u8>> {
        if reload {
            self.load().await?;
        }

        let live: Vec<String> = self.state.lock().unwrap().keys().cloned().collect();
        Ok(serde_json::to_vec(&live)?)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Destroy-section parser of the test plugin: reads a `resources` string
/// list into identifiers.
pub fn parse_test_destroy_section(section: &Mapping) -> Result<Identifiers> {
    let resources = section
        .get("resources")
        .context("'resources' field is mandatory in test destroy sections")?
        .as_sequence()
        .context("'resources' field should be of type array")?;

    resources
        .iter()
        .map(|resource| {
            let name = resource
                .as_str()
                .context("test destroy resources should be strings")?;
            Ok(Arc::new(TestIdentifier::new(name)) as Arc<dyn Identifier>)
        })
        .collect()
}

/// Killer of the test plugin: removes the named resources from the live
/// state.
pub struct TestKiller {
    system: Arc<TestSystem>,
}

impl TestKiller {
    pub fn new(system: Arc<TestSystem>) -> Self {
        Self { system }
    }
}

#[async_trait]
impl Killer for TestKiller {
    async fn kill(&self, identifiers: &Identifiers) -> Result<()> {
        let mut state = self.system.state.lock().unwrap();
        for identifier in identifiers {
            state.remove(identifier.id().as_str());
        }

        Ok(())
    }
}

/// Registers the test system, destroyer and killer under
/// [`TEST_SYSTEM_TYPE`]. Safe to call from multiple tests.
pub fn register_test_system() {
    registry::register_system(TEST_SYSTEM_TYPE, || Box::new(TestSystem::new()));
    registry::register_destroyer(TEST_SYSTEM_TYPE, parse_test_destroy_section);
    registry::register_killer(TEST_SYSTEM_TYPE, |system| {
        let test_system = system
            .as_any()
            .downcast::<TestSystem>()
            .map_err(|_| anyhow!("unsupported system passed to instantiate test killer"))?;

        Ok(Box::new(TestKiller::new(test_system)) as Box<dyn Killer>)
    });
    registry::register_ready_parser(AFTER_READY_KIND, AfterParser);
}

/// A plugin implementation under conformance test.
pub struct Plugin {
    pub system: Arc<dyn System>,
    pub destroyer: Arc<dyn Destroyer>,
    pub killer: Arc<dyn Killer>,
}

/// Inputs for the conformance checks.
pub struct Conformance {
    /// Identifiers to kill when checking that validation notices damage.
    pub identifiers: Identifiers,
    /// A sample destroy section the destroyer must parse.
    pub destroy_section: Mapping,
}

/// Runs every conformance check against the plugin.
pub async fn validate_all(plugin: &Plugin, conformance: &Conformance) {
    validate_destroyer_parse(plugin, conformance);
    validate_after_system_load(plugin).await;
    validate_after_kill(plugin, conformance).await;
}

/// The destroyer must parse the sample destroy section into a non-empty
/// identifier group.
pub fn validate_destroyer_parse(plugin: &Plugin, conformance: &Conformance) {
    assert!(
        !conformance.destroy_section.is_empty(),
        "conformance destroy section must not be empty"
    );

    let identifiers = plugin
        .destroyer
        .parse_destroy_section(&conformance.destroy_section)
        .expect("destroyer failed to parse the sample destroy section");
    assert!(
        !identifiers.is_empty(),
        "destroyer parsed the sample destroy section to no identifiers"
    );
}

/// Validation must pass immediately after the system captured its state.
pub async fn validate_after_system_load(plugin: &Plugin) {
    plugin.system.load().await.expect("system failed to load");

    let ok = plugin
        .system
        .validate()
        .await
        .expect("validation errored right after load");
    assert!(ok, "validation failed right after load");
}

/// Validation must not pass right after resources were killed.
pub async fn validate_after_kill(plugin: &Plugin, conformance: &Conformance) {
    assert!(
        !conformance.identifiers.is_empty(),
        "conformance identifiers must not be empty"
    );

    plugin.system.load().await.expect("system failed to load");
    plugin
        .killer
        .kill(&conformance.identifiers)
        .await
        .expect("killer failed");

    if let Ok(true) = plugin.system.validate().await {
        panic!("validation shouldn't succeed after kill");
    }
}
