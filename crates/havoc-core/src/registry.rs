//! Process-wide plugin registry.
//!
//! Backend crates register their constructors here during program bootstrap;
//! the configuration parser and the chaos pipeline resolve them by the type
//! names referenced in the input document. Registration is idempotent by key
//! (last write wins) and safe under concurrent bootstrap; lookups during a
//! run are read-only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use once_cell::sync::Lazy;

use crate::system::{Destroyer, Killer, ReadyParser, System};

pub(crate) type SystemCtor = Arc<dyn Fn() -> Box<dyn System> + Send + Sync>;
pub(crate) type KillerCtor =
    Arc<dyn Fn(Arc<dyn System>) -> Result<Box<dyn Killer>> + Send + Sync>;

static SYSTEMS: Lazy<Mutex<HashMap<String, SystemCtor>>> = Lazy::new(Mutex::default);
static DESTROYERS: Lazy<Mutex<HashMap<String, Arc<dyn Destroyer>>>> = Lazy::new(Mutex::default);
static KILLERS: Lazy<Mutex<HashMap<String, KillerCtor>>> = Lazy::new(Mutex::default);
static READY_PARSERS: Lazy<Mutex<HashMap<String, Arc<dyn ReadyParser>>>> =
    Lazy::new(Mutex::default);

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registers a constructor for systems of the given backend type.
pub fn register_system(
    name: impl Into<String>,
    ctor: impl Fn() -> Box<dyn System> + Send + Sync + 'static,
) {
    guard(&SYSTEMS).insert(name.into(), Arc::new(ctor));
}

/// Registers the destroy-section parser for the given backend type.
pub fn register_destroyer(name: impl Into<String>, destroyer: impl Destroyer + 'static) {
    guard(&DESTROYERS).insert(name.into(), Arc::new(destroyer));
}

/// Registers a killer constructor for the given backend type. The
/// constructor receives the system the killer will act on.
pub fn register_killer(
    name: impl Into<String>,
    ctor: impl Fn(Arc<dyn System>) -> Result<Box<dyn Killer>> + Send + Sync + 'static,
) {
    guard(&KILLERS).insert(name.into(), Arc::new(ctor));
}

/// Registers a parser for ready sections of the given kind.
pub fn register_ready_parser(kind: impl Into<String>, parser: impl ReadyParser + 'static) {
    guard(&READY_PARSERS).insert(kind.into(), Arc::new(parser));
}

pub(crate) fn system_ctor(name: &str) -> Option<SystemCtor> {
    guard(&SYSTEMS).get(name).cloned()
}

pub(crate) fn destroyer(name: &str) -> Option<Arc<dyn Destroyer>> {
    guard(&DESTROYERS).get(name).cloned()
}

pub(crate) fn killer_ctor(name: &str) -> Option<KillerCtor> {
    guard(&KILLERS).get(name).cloned()
}

pub(crate) fn ready_parser(kind: &str) -> Option<Arc<dyn ReadyParser>> {
    guard(&READY_PARSERS).get(kind).cloned()
}
