//! Built-in effect registry.
//!
//! Each effect exposes metadata and a factory that plugs into the trait-based
//! pipeline defined in `stomp-dsp`. Both built-ins are spectral: they run the
//! shared block-buffered STFT engine with their own magnitude policy.

use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, Result};
use stomp_dsp::{Effect, EffectFactory, EffectMetadata};
use tracing::warn;

mod bank;
pub mod controls;
pub mod feedback;
pub mod formant;

pub use feedback::{FeedbackSuppressionEffect, NotchState, NotchTracker};
pub use formant::{FormantShiftEffect, FormantWarp};

/// Logical identifiers for built-in effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectKind {
    FeedbackSuppression,
    FormantShift,
}

impl EffectKind {
    pub const ALL: [EffectKind; 2] = [EffectKind::FeedbackSuppression, EffectKind::FormantShift];

    pub fn id(self) -> &'static str {
        match self {
            EffectKind::FeedbackSuppression => "feedback_suppression",
            EffectKind::FormantShift => "formant_shift",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::FeedbackSuppression => "Feedback Suppression",
            EffectKind::FormantShift => "Formant Shift",
        }
    }

    fn factory(self) -> Box<dyn EffectFactory> {
        match self {
            EffectKind::FeedbackSuppression => Box::new(feedback::FeedbackSuppressionFactory::new()),
            EffectKind::FormantShift => Box::new(formant::FormantShiftFactory::new()),
        }
    }
}

pub struct EffectRegistry {
    factories: HashMap<&'static str, Box<dyn EffectFactory>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for kind in EffectKind::ALL {
            if let Err(err) = registry.register(kind.factory()) {
                warn!("{err:#}");
            }
        }
        registry
    }

    pub fn register(&mut self, factory: Box<dyn EffectFactory>) -> Result<()> {
        let id = factory.metadata().id;
        if self.factories.contains_key(id) {
            return Err(anyhow!("effect `{id}` already registered"));
        }
        self.factories.insert(id, factory);
        Ok(())
    }

    pub fn metadata(&self) -> Vec<Arc<EffectMetadata>> {
        let mut entries: Vec<_> = self
            .factories
            .values()
            .map(|factory| Arc::new(factory.metadata().clone()))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(b.name));
        entries
    }

    pub fn metadata_by_id(&self, id: &str) -> Option<Arc<EffectMetadata>> {
        self.factories
            .get(id)
            .map(|factory| Arc::new(factory.metadata().clone()))
    }

    pub fn create(
        &self,
        id: &str,
        sample_rate: u32,
        channels: usize,
        block_size: usize,
    ) -> Result<Box<dyn Effect>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| anyhow!("effect `{id}` not registered"))?;
        factory.create(sample_rate, channels, block_size)
    }
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
