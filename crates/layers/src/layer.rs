use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The two rendering backends a layer can be played into.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineKind {
    /// Custom 3D globe renderer for orbital views.
    Sphere,
    /// Map-tile engine for close-up views.
    Tile,
}

/// Base layers the loading screen waits for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseLayer {
    Coastlines,
    Borders,
    Labels,
}

impl BaseLayer {
    pub const ALL: [BaseLayer; 3] = [BaseLayer::Coastlines, BaseLayer::Borders, BaseLayer::Labels];
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerLoad {
    #[default]
    Pending,
    Loaded,
    /// Failed layers stay empty and are not retried.
    Failed,
}

/// Fires once when every base layer has settled, loaded or failed.
#[derive(Debug, Clone, Default)]
pub struct LayersReady {
    states: BTreeMap<BaseLayer, LayerLoad>,
    fired: bool,
}

impl LayersReady {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, layer: BaseLayer) -> LayerLoad {
        self.states.get(&layer).copied().unwrap_or_default()
    }

    pub fn is_settled(&self) -> bool {
        BaseLayer::ALL
            .iter()
            .all(|l| self.state(*l) != LayerLoad::Pending)
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Records a layer outcome. Returns `true` exactly once, on the update
    /// that settles the last pending layer.
    pub fn set(&mut self, layer: BaseLayer, state: LayerLoad) -> bool {
        self.states.insert(layer, state);
        if !self.fired && self.is_settled() {
            self.fired = true;
            return true;
        }
        false
    }
}
