//! Host-side registry of supported protocols.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::id::ProtocolId;
use super::{LS, NA};
use crate::error::{Error, Result};

/// Protocol id to handler mapping, in registration order.
///
/// Readers (in-flight `ls` and proposal lookups) take a short read lock and
/// copy out what they need; registration takes the write lock. The lock is
/// never held across an await point.
#[derive(Debug)]
pub struct HandlerRegistry<H> {
    entries: RwLock<Vec<(ProtocolId, H)>>,
}

impl<H> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<H> HandlerRegistry<H> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<(ProtocolId, H)>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<(ProtocolId, H)>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for `protocol`.
    ///
    /// Re-registering an id replaces its handler in place, keeping the id's
    /// original position in the listing, and returns the old handler.
    pub fn insert(&self, protocol: ProtocolId, handler: H) -> Result<Option<H>> {
        if protocol == LS || protocol == NA {
            return Err(Error::InvalidProtocol(format!(
                "{protocol:?} is a reserved multistream command"
            )));
        }

        let mut entries = self.write();
        if let Some((_, existing)) = entries.iter_mut().find(|(id, _)| *id == protocol) {
            return Ok(Some(std::mem::replace(existing, handler)));
        }
        entries.push((protocol, handler));
        Ok(None)
    }

    /// Unregister `protocol`, returning its handler.
    pub fn remove(&self, protocol: &str) -> Option<H> {
        let mut entries = self.write();
        let index = entries.iter().position(|(id, _)| id == protocol)?;
        Some(entries.remove(index).1)
    }

    /// Check whether `protocol` is registered.
    pub fn contains(&self, protocol: &str) -> bool {
        self.read().iter().any(|(id, _)| id == protocol)
    }

    /// Registered ids in registration order.
    pub fn protocols(&self) -> Vec<ProtocolId> {
        self.read().iter().map(|(id, _)| id.clone()).collect()
    }

    /// The `ls` reply: registered ids joined by newlines.
    pub fn listing(&self) -> String {
        self.read()
            .iter()
            .map(|(id, _)| id.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of registered protocols.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl<H: Clone> HandlerRegistry<H> {
    /// Handler registered for `protocol`.
    pub fn get(&self, protocol: &str) -> Option<H> {
        self.lookup(protocol).map(|(_, handler)| handler)
    }

    /// Id and handler for `protocol`, read under a single lock.
    pub fn lookup(&self, protocol: &str) -> Option<(ProtocolId, H)> {
        self.read()
            .iter()
            .find(|(id, _)| id == protocol)
            .map(|(id, handler)| (id.clone(), handler.clone()))
    }
}
