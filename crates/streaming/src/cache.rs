use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use formats::BoundaryCollection;
use foundation::{GeoBounds, LngLat};
use serde::Serialize;
use thiserror::Error;

use crate::request::Request;
use crate::residency::ResidencyState;

/// `empireId:year` cache key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryKey {
    pub empire_id: String,
    pub year: i32,
}

impl BoundaryKey {
    pub fn new(empire_id: impl Into<String>, year: i32) -> Self {
        Self {
            empire_id: empire_id.into(),
            year,
        }
    }
}

impl fmt::Display for BoundaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.empire_id, self.year)
    }
}

/// Boundary polygons of one historical entity in one year.
#[derive(Debug, Clone, PartialEq)]
pub struct EmpireBoundary {
    pub key: BoundaryKey,
    pub collection: BoundaryCollection,
    pub bbox: Option<GeoBounds>,
}

impl EmpireBoundary {
    pub fn new(key: BoundaryKey, collection: BoundaryCollection) -> Self {
        let bbox = collection.bbox();
        Self {
            key,
            collection,
            bbox,
        }
    }

    pub fn contains(&self, p: LngLat) -> bool {
        self.bbox.is_some_and(|b| b.contains(p)) && self.collection.contains(p)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    state: ResidencyState,
    request: Option<Request>,
    boundary: Option<Arc<EmpireBoundary>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("unknown request {0}")]
    UnknownRequest(Request),

    #[error("request {request} for {key} was superseded")]
    Superseded { request: Request, key: BoundaryKey },
}

/// Deterministic boundary cache keyed by `empireId:year`.
///
/// Notes on determinism:
/// - Entries are keyed in a `BTreeMap` for stable traversal order.
/// - Each key remembers the one request allowed to fill it; a response
///   carrying any other token is rejected.
#[derive(Debug, Default)]
pub struct BoundaryCache {
    next_request: u64,
    entries: BTreeMap<BoundaryKey, CacheEntry>,
    requests: BTreeMap<Request, BoundaryKey>,
}

impl BoundaryCache {
    pub fn new() -> Self {
        Self {
            next_request: 1,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self, key: &BoundaryKey) -> Option<ResidencyState> {
        self.entries.get(key).map(|e| e.state)
    }

    pub fn get(&self, key: &BoundaryKey) -> Option<&Arc<EmpireBoundary>> {
        self.entries.get(key).and_then(|e| e.boundary.as_ref())
    }

    pub fn key_for_request(&self, req: Request) -> Option<&BoundaryKey> {
        self.requests.get(&req)
    }

    /// Registers a new request for `key`, replacing any earlier one.
    pub fn request(&mut self, key: BoundaryKey) -> Request {
        let req = Request(self.next_request.max(1));
        self.next_request = req.0 + 1;

        let entry = self.entries.entry(key.clone()).or_insert(CacheEntry {
            state: ResidencyState::Requested,
            request: None,
            boundary: None,
        });
        if let Some(old) = entry.request.replace(req) {
            self.requests.remove(&old);
        }
        entry.state = ResidencyState::Requested;
        entry.boundary = None;
        self.requests.insert(req, key);
        req
    }

    /// Marks an in-flight request as aborted. Returns `true` if it was live.
    pub fn abort(&mut self, req: Request) -> bool {
        let Some(key) = self.requests.remove(&req) else {
            return false;
        };
        if let Some(entry) = self.entries.get_mut(&key)
            && entry.request == Some(req)
        {
            entry.request = None;
            entry.state = ResidencyState::Aborted;
        }
        true
    }

    /// Stores the result of `req`. Rejects requests that were aborted or
    /// replaced in the meantime.
    pub fn fill(
        &mut self,
        req: Request,
        result: Option<BoundaryCollection>,
    ) -> Result<BoundaryKey, CacheError> {
        let key = self
            .requests
            .remove(&req)
            .ok_or(CacheError::UnknownRequest(req))?;
        let entry = self
            .entries
            .get_mut(&key)
            .filter(|e| e.request == Some(req))
            .ok_or_else(|| CacheError::Superseded {
                request: req,
                key: key.clone(),
            })?;
        entry.request = None;
        match result {
            Some(collection) => {
                entry.state = ResidencyState::Resident;
                entry.boundary = Some(Arc::new(EmpireBoundary::new(key.clone(), collection)));
            }
            None => {
                entry.state = ResidencyState::Failed;
                entry.boundary = None;
            }
        }
        Ok(key)
    }

    /// Drops one key; any live request for it is forgotten.
    pub fn evict(&mut self, key: &BoundaryKey) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        if let Some(req) = entry.request {
            self.requests.remove(&req);
        }
        true
    }

    /// Drops every year of `empire_id`. Returns the evicted keys in order.
    pub fn evict_empire(&mut self, empire_id: &str) -> Vec<BoundaryKey> {
        let keys: Vec<BoundaryKey> = self
            .entries
            .keys()
            .filter(|k| k.empire_id == empire_id)
            .cloned()
            .collect();
        for k in &keys {
            self.evict(k);
        }
        keys
    }
}
