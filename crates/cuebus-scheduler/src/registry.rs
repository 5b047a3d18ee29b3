use std::collections::BTreeMap;

use cuebus_core::{Target, TargetId};

/// Where a batch for one target is sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetAddress {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<&Target> for TargetAddress {
    fn from(target: &Target) -> Self {
        Self {
            host: target.host.clone(),
            port: target.port,
        }
    }
}

/// In-memory view of the persisted targets, keyed by id.
///
/// Only the engine mutates it, and only after the matching repository write
/// succeeded.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: BTreeMap<TargetId, Target>,
}

impl TargetRegistry {
    pub fn new(targets: impl IntoIterator<Item = Target>) -> Self {
        Self {
            targets: targets.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    pub fn resolve(&self, id: TargetId) -> Option<TargetAddress> {
        self.targets.get(&id).map(TargetAddress::from)
    }

    pub fn add(&mut self, target: Target) {
        self.targets.insert(target.id, target);
    }

    /// Returns the removed target, `None` if it was not registered.
    pub fn remove(&mut self, id: TargetId) -> Option<Target> {
        self.targets.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Copy of every target in id order, as handed to a dispatch.
    pub fn snapshot(&self) -> Vec<Target> {
        self.targets.values().cloned().collect()
    }
}
