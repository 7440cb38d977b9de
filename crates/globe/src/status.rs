//! Loading-status line and dismissible advisories.

use std::collections::BTreeMap;

use foundation::Time;
use runtime::MinimumDisplay;
use serde::{Deserialize, Serialize};

/// Holds each status message on screen for at least the configured time,
/// so fast loads do not flicker.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    inner: MinimumDisplay<String>,
}

impl StatusBoard {
    pub fn new(min_display_ms: u64) -> Self {
        Self {
            inner: MinimumDisplay::new(min_display_ms),
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.inner.current().map(String::as_str)
    }

    /// Returns `true` if the visible message changed.
    pub fn show(&mut self, message: impl Into<String>, now: Time) -> bool {
        self.inner.show(message.into(), now)
    }

    /// Clears once the current message has been up long enough.
    pub fn clear(&mut self) {
        self.inner.request_clear();
    }

    /// Returns `true` when a pending clear took effect.
    pub fn poll(&mut self, now: Time) -> bool {
        self.inner.poll(now)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdvisoryKind {
    TileEngineUnavailable,
    SoftwareRendering,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Advisory {
    /// The tile engine could not start; the globe stays on the sphere engine.
    TileEngineUnavailable { reason: String },
    /// The graphics stack is software-rendered.
    SoftwareRendering,
}

impl Advisory {
    pub fn kind(&self) -> AdvisoryKind {
        match self {
            Advisory::TileEngineUnavailable { .. } => AdvisoryKind::TileEngineUnavailable,
            Advisory::SoftwareRendering => AdvisoryKind::SoftwareRendering,
        }
    }
}

/// Banners currently shown. Each kind is shown at most once until dismissed.
#[derive(Debug, Clone, Default)]
pub struct Advisories {
    active: BTreeMap<AdvisoryKind, Advisory>,
}

impl Advisories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if an advisory of the same kind is already up.
    pub fn raise(&mut self, advisory: Advisory) -> bool {
        let kind = advisory.kind();
        if self.active.contains_key(&kind) {
            return false;
        }
        self.active.insert(kind, advisory);
        true
    }

    pub fn dismiss(&mut self, kind: AdvisoryKind) -> bool {
        self.active.remove(&kind).is_some()
    }

    pub fn is_active(&self, kind: AdvisoryKind) -> bool {
        self.active.contains_key(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Advisory> + '_ {
        self.active.values()
    }
}
