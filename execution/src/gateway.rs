//! Persistence boundary: an abstract byte-oriented key-value contract plus
//! typed load/save helpers over the versioned record envelope.

use std::collections::HashMap;
use std::sync::RwLock;

use commonware_codec::{Encode, ReadExt};
use gridstake_types::store::{StoreKey, Value};
use thiserror::Error;

use crate::EngineError;

/// Error raised by a persistence backend.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct GatewayError(pub String);

/// Abstract key-value persistence. Implementations only move bytes; record
/// encoding stays inside the engine.
pub trait PersistenceGateway: Send + Sync {
    fn get(&self, key: &StoreKey) -> Result<Option<Vec<u8>>, GatewayError>;
    fn put(&self, key: &StoreKey, bytes: Vec<u8>) -> Result<(), GatewayError>;
}

/// In-memory gateway for tests and single-process deployments.
#[derive(Default)]
pub struct Memory {
    entries: RwLock<HashMap<StoreKey, Vec<u8>>>,
}

impl PersistenceGateway for Memory {
    fn get(&self, key: &StoreKey) -> Result<Option<Vec<u8>>, GatewayError> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &StoreKey, bytes: Vec<u8>) -> Result<(), GatewayError> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.clone(), bytes);
        Ok(())
    }
}

/// Load and decode the record stored under `key`, if any.
pub(crate) fn load<G: PersistenceGateway + ?Sized>(
    gateway: &G,
    key: &StoreKey,
) -> Result<Option<Value>, EngineError> {
    let Some(bytes) = gateway.get(key)? else {
        return Ok(None);
    };
    let value = Value::read(&mut &bytes[..])
        .map_err(|e| GatewayError(format!("decoding {:?}: {}", key, e)))?;
    Ok(Some(value))
}

/// Encode and store a record under `key`.
pub(crate) fn save<G: PersistenceGateway + ?Sized>(
    gateway: &G,
    key: &StoreKey,
    value: &Value,
) -> Result<(), EngineError> {
    gateway.put(key, value.encode().to_vec())?;
    Ok(())
}

/// A stored record did not match the type its key implies.
pub(crate) fn corrupt(what: &str) -> EngineError {
    EngineError::Persistence(GatewayError(format!("unexpected record under {what} key")))
}
