use std::sync::Arc;

use crate::backend::Registry;
use crate::config::Settings;
use crate::depsfile::ProviderOverrides;
use crate::encryption::Encryption;
use crate::engine::{ConfigLoader, CoreEngine};
use crate::interrupt::InterruptContext;
use crate::logging::{AuditSink, FactsEmitter};
use crate::views::{ApprovalPrompt, Hook, View};

/// Builder for an [`OpCore`](super::OpCore), collecting collaborators
/// before construction instead of chaining `with_*` on the facade.
pub struct OpCoreBuilder<E: FactsEmitter, A: AuditSink> {
    facts: E,
    audit: A,
    settings: Settings,
    engine: Arc<dyn CoreEngine>,
    loader: Option<Arc<dyn ConfigLoader>>,
    registry: Option<Registry>,
    encryption: Option<Arc<dyn Encryption>>,
    overrides: ProviderOverrides,
    view: Option<Arc<dyn View>>,
    prompt: Option<Arc<dyn ApprovalPrompt>>,
    hooks: Vec<Arc<dyn Hook>>,
    interrupts: Option<InterruptContext>,
    redact: bool,
}

impl<E: FactsEmitter, A: AuditSink> OpCoreBuilder<E, A> {
    pub fn new(facts: E, audit: A, settings: Settings, engine: Arc<dyn CoreEngine>) -> Self {
        Self {
            facts,
            audit,
            settings,
            engine,
            loader: None,
            registry: None,
            encryption: None,
            overrides: ProviderOverrides::default(),
            view: None,
            prompt: None,
            hooks: Vec::new(),
            interrupts: None,
            redact: false,
        }
    }

    #[must_use]
    pub fn config_loader(mut self, loader: Arc<dyn ConfigLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn encryption(mut self, enc: Arc<dyn Encryption>) -> Self {
        self.encryption = Some(enc);
        self
    }

    #[must_use]
    pub fn overrides(mut self, overrides: ProviderOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    #[must_use]
    pub fn view(mut self, view: Arc<dyn View>) -> Self {
        self.view = Some(view);
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: Arc<dyn ApprovalPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    #[must_use]
    pub fn interrupts(mut self, ctx: InterruptContext) -> Self {
        self.interrupts = Some(ctx);
        self
    }

    #[must_use]
    pub fn redact(mut self, yes: bool) -> Self {
        self.redact = yes;
        self
    }

    pub fn build(self) -> super::OpCore<E, A> {
        let mut api = super::OpCore::new(self.facts, self.audit, self.settings, self.engine)
            .with_overrides(self.overrides)
            .with_redaction(self.redact);
        if let Some(l) = self.loader {
            api = api.with_config_loader(l);
        }
        if let Some(r) = self.registry {
            api = api.with_registry(r);
        }
        if let Some(e) = self.encryption {
            api = api.with_encryption(e);
        }
        if let Some(v) = self.view {
            api = api.with_view(v);
        }
        if let Some(p) = self.prompt {
            api = api.with_prompt(p);
        }
        if let Some(i) = self.interrupts {
            api = api.with_interrupts(i);
        }
        for h in self.hooks {
            api = api.with_hook(h);
        }
        api
    }
}
