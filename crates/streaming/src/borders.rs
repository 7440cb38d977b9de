//! Temporal boundary loading for historical entities.
//!
//! The loader never performs I/O itself. It emits [`FetchCommand`]s for the
//! host to execute and accepts the responses through [`EmpireBorderLoader::complete`].
//! Per empire at most one fetch is live; asking for another year aborts the
//! previous one, and the year on screen is only replaced once the new year
//! is resident.

use std::collections::BTreeMap;
use std::sync::Arc;

use formats::{BoundaryCollection, GeoJsonError};
use foundation::LngLat;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{BoundaryCache, BoundaryKey, EmpireBoundary};
use crate::request::Request;
use crate::residency::ResidencyState;

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error(transparent)]
    Parse(#[from] GeoJsonError),
}

/// Work for the host's network layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FetchCommand {
    Start {
        request: Request,
        key: BoundaryKey,
        url: String,
    },
    Abort {
        request: Request,
    },
}

/// Outcome of feeding a response into the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The boundary is now displayed; `replaced` is the year it took over from.
    Shown {
        key: BoundaryKey,
        replaced: Option<i32>,
    },
    /// The fetch failed; the empire shows nothing.
    Failed { key: BoundaryKey },
    /// The response belonged to an aborted or superseded request.
    Discarded,
}

#[derive(Debug)]
pub struct EmpireBorderLoader {
    base_url: String,
    cache: BoundaryCache,
    /// Year currently on screen per empire.
    displayed: BTreeMap<String, i32>,
    /// Live fetch per empire.
    in_flight: BTreeMap<String, (Request, i32)>,
    revision: u64,
}

impl EmpireBorderLoader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: BoundaryCache::new(),
            displayed: BTreeMap::new(),
            in_flight: BTreeMap::new(),
            revision: 0,
        }
    }

    pub fn url_for(&self, key: &BoundaryKey) -> String {
        format!("{}/{}/{}.geojson", self.base_url, key.empire_id, key.year)
    }

    /// Bumped whenever the displayed set changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn cache(&self) -> &BoundaryCache {
        &self.cache
    }

    pub fn displayed_year(&self, empire_id: &str) -> Option<i32> {
        self.displayed.get(empire_id).copied()
    }

    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Displayed boundaries in key order.
    pub fn displayed(&self) -> impl Iterator<Item = &Arc<EmpireBoundary>> + '_ {
        self.displayed
            .iter()
            .filter_map(|(id, year)| self.cache.get(&BoundaryKey::new(id.clone(), *year)))
    }

    /// Reconciles the loader with the active `empire id -> year` set.
    ///
    /// Hidden empires are dropped entirely (every cached year). For each
    /// active empire the wanted year is shown at once if cached, otherwise
    /// fetched; an in-flight fetch for a different year is aborted first.
    pub fn set_active(&mut self, active: &BTreeMap<String, i32>) -> Vec<FetchCommand> {
        let mut commands = Vec::new();

        let known: Vec<String> = self
            .displayed
            .keys()
            .chain(self.in_flight.keys())
            .cloned()
            .collect();
        for id in known {
            if !active.contains_key(&id) {
                commands.extend(self.hide(&id));
            }
        }

        for (id, &year) in active {
            commands.extend(self.show_year(id, year));
        }
        commands
    }

    fn hide(&mut self, empire_id: &str) -> Option<FetchCommand> {
        let abort = self.in_flight.remove(empire_id).map(|(request, year)| {
            debug!(empire = %empire_id, year, request = %request, "aborting boundary fetch");
            self.cache.abort(request);
            FetchCommand::Abort { request }
        });
        if self.displayed.remove(empire_id).is_some() {
            self.revision += 1;
        }
        self.cache.evict_empire(empire_id);
        abort
    }

    fn show_year(&mut self, empire_id: &str, year: i32) -> Vec<FetchCommand> {
        let mut commands = Vec::new();
        if self.displayed.get(empire_id) == Some(&year) && !self.in_flight.contains_key(empire_id) {
            return commands;
        }

        if let Some(&(request, pending_year)) = self.in_flight.get(empire_id) {
            if pending_year == year {
                return commands;
            }
            debug!(empire = %empire_id, year = pending_year, request = %request, "superseding boundary fetch");
            self.in_flight.remove(empire_id);
            self.cache.abort(request);
            self.cache.evict(&BoundaryKey::new(empire_id, pending_year));
            commands.push(FetchCommand::Abort { request });
        }

        if self.displayed.get(empire_id) == Some(&year) {
            return commands;
        }

        let key = BoundaryKey::new(empire_id, year);
        if self.cache.state(&key) == Some(ResidencyState::Resident) {
            self.swap_displayed(empire_id, year);
            return commands;
        }

        let request = self.cache.request(key.clone());
        self.in_flight.insert(empire_id.to_string(), (request, year));
        let url = self.url_for(&key);
        debug!(key = %key, request = %request, url = %url, "requesting boundary");
        commands.push(FetchCommand::Start { request, key, url });
        commands
    }

    /// Puts `year` on screen and drops the previous year's geometry.
    fn swap_displayed(&mut self, empire_id: &str, year: i32) -> Option<i32> {
        let replaced = self.displayed.insert(empire_id.to_string(), year);
        if let Some(old) = replaced.filter(|old| *old != year) {
            self.cache.evict(&BoundaryKey::new(empire_id, old));
        }
        self.revision += 1;
        replaced.filter(|old| *old != year)
    }

    /// Applies a finished fetch. Stale responses are dropped without touching
    /// the scene.
    pub fn complete(&mut self, request: Request, payload: Result<&str, BoundaryError>) -> Completion {
        let Some(key) = self.cache.key_for_request(request).cloned() else {
            debug!(request = %request, "discarding stale boundary response");
            return Completion::Discarded;
        };
        if self.in_flight.get(&key.empire_id).map(|(r, _)| *r) != Some(request) {
            debug!(key = %key, request = %request, "discarding superseded boundary response");
            return Completion::Discarded;
        }

        let parsed = payload.and_then(|body| Ok(BoundaryCollection::from_geojson_str(body)?));
        self.in_flight.remove(&key.empire_id);

        match parsed {
            Ok(collection) => {
                if let Err(err) = self.cache.fill(request, Some(collection)) {
                    debug!(%err, "boundary response rejected by cache");
                    return Completion::Discarded;
                }
                let replaced = self.swap_displayed(&key.empire_id, key.year);
                Completion::Shown { key, replaced }
            }
            Err(err) => {
                warn!(key = %key, %err, "boundary fetch failed; leaving layer empty");
                let _ = self.cache.fill(request, None);
                if let Some(old) = self.displayed.remove(&key.empire_id) {
                    self.cache.evict(&BoundaryKey::new(key.empire_id.clone(), old));
                    self.revision += 1;
                }
                Completion::Failed { key }
            }
        }
    }

    /// Whether `p` lies inside any displayed boundary.
    pub fn contains(&self, p: LngLat) -> bool {
        self.displayed().any(|b| b.contains(p))
    }

    /// Ids of displayed empires whose territory includes `p`, in id order.
    pub fn empires_containing(&self, p: LngLat) -> Vec<String> {
        self.displayed()
            .filter(|b| b.contains(p))
            .map(|b| b.key.empire_id.clone())
            .collect()
    }
}
