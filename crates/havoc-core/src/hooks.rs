//! User hooks around the chaos pipeline phases.
//!
//! Hooks are observational: they let callers collect logs, capture system
//! state or notify external tooling at phase boundaries. A failing hook is
//! recorded in the audit report but never halts the run.

use std::future::Future;

use anyhow::Result;
use futures::future::BoxFuture;

/// A boxed async hook callback.
pub type HookFn = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Optional callbacks invoked before and after the ready, load and chaos
/// phases. Built with the `with_*` methods; every slot defaults to unset.
#[derive(Default)]
pub struct Hook {
    pub(crate) pre_ready: Option<HookFn>,
    pub(crate) post_ready: Option<HookFn>,
    pub(crate) pre_system_load: Option<HookFn>,
    pub(crate) post_system_load: Option<HookFn>,
    pub(crate) pre_chaos: Option<HookFn>,
    pub(crate) post_chaos: Option<HookFn>,
}

macro_rules! hook_setter {
    ($(#[$doc:meta])* $name:ident, $slot:ident) => {
        $(#[$doc])*
        pub fn $name<F, Fut>(mut self, hook: F) -> Self
        where
            F: Fn() -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<()>> + Send + 'static,
        {
            self.$slot = Some(Box::new(move || Box::pin(hook())));
            self
        }
    };
}

impl Hook {
    pub fn new() -> Self {
        Self::default()
    }

    hook_setter!(
        /// Runs before the ready condition is evaluated.
        with_pre_ready,
        pre_ready
    );
    hook_setter!(
        /// Runs after the ready phase, on every exit path.
        with_post_ready,
        post_ready
    );
    hook_setter!(
        /// Runs before systems capture their desired state.
        with_pre_system_load,
        pre_system_load
    );
    hook_setter!(
        /// Runs after the load phase, on every exit path.
        with_post_system_load,
        post_system_load
    );
    hook_setter!(
        /// Runs before the first chaos scenario.
        with_pre_chaos,
        pre_chaos
    );
    hook_setter!(
        /// Runs after the last chaos scenario, on every exit path.
        with_post_chaos,
        post_chaos
    );
}
