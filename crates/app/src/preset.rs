use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stomp_dsp::{EffectChain, ParameterValue};
use stomp_effects::{EffectKind, EffectRegistry};
use tracing::{debug, warn};

pub const PRESET_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub version: u32,
    pub effects: Vec<PresetEffect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetEffect {
    pub id: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub parameters: Vec<PresetParameter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetParameter {
    pub id: String,
    pub value: f32,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            version: PRESET_VERSION,
            effects: vec![PresetEffect {
                id: EffectKind::FeedbackSuppression.id().to_string(),
                enabled: true,
                parameters: Vec::new(),
            }],
        }
    }
}

impl Preset {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read preset `{}`", path.display()))?;
        Self::from_json(&data)
            .with_context(|| format!("failed to parse preset `{}`", path.display()))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let preset: Preset = serde_json::from_str(data).context("invalid preset JSON")?;
        if preset.version != PRESET_VERSION {
            warn!(
                "preset version {} does not match expected {}",
                preset.version, PRESET_VERSION
            );
        }
        Ok(preset)
    }

    /// Instantiates every known effect in order. Unknown effects and
    /// parameters are skipped with a warning.
    pub fn build_chain(
        &self,
        registry: &EffectRegistry,
        sample_rate: u32,
        channels: usize,
        block_size: usize,
    ) -> Result<EffectChain> {
        let mut chain = EffectChain::new();
        for effect in &self.effects {
            let metadata = match registry.metadata_by_id(&effect.id) {
                Some(metadata) => metadata,
                None => {
                    warn!("preset references unknown effect `{}`", effect.id);
                    continue;
                }
            };

            let mut instance = registry
                .create(&effect.id, sample_rate, channels, block_size)
                .with_context(|| format!("failed to instantiate effect `{}`", effect.id))?;

            for parameter in &effect.parameters {
                if let Some(spec) = metadata.parameter(&parameter.id) {
                    instance.update_parameter(ParameterValue {
                        id: spec.id,
                        value: parameter.value,
                    });
                } else {
                    warn!(
                        "preset references unknown parameter `{}` for effect `{}`",
                        parameter.id, effect.id
                    );
                }
            }
            instance.set_enabled(effect.enabled);
            debug!(effect = %effect.id, enabled = effect.enabled, "effect added to chain");
            chain.add_effect(instance);
        }
        Ok(chain)
    }
}
