//! Single-slot secure storage for the hardware key identifier.
//!
//! The SDK persists exactly one opaque key identifier. On device the host
//! application backs this trait with the platform keychain (protected at
//! rest, readable after the first unlock since boot); [`MemoryKeyStore`] is
//! the in-process implementation used in tests and ephemeral setups.

use std::sync::Mutex;

use crate::error::AttestError;

/// Secure, single-slot persistence for the key identifier.
///
/// Contract: `save` has overwrite (delete-then-write) semantics and is
/// atomic with respect to `load`: a concurrent `load` observes either the
/// old value or the new one, never a partial write. `load` of an empty slot
/// is `Ok(None)`, not an error; `delete` of an empty slot is a no-op.
pub trait KeyMaterialStore: Send + Sync {
    /// Persist the key identifier, replacing any previous value.
    fn save(&self, value: &str) -> Result<(), AttestError>;

    /// Load the stored key identifier, if any.
    fn load(&self) -> Result<Option<String>, AttestError>;

    /// Remove the stored key identifier. No-op when the slot is empty.
    fn delete(&self) -> Result<(), AttestError>;
}

/// In-process key store over a mutex-guarded slot.
#[derive(Default)]
pub struct MemoryKeyStore {
    slot: Mutex<Option<String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyMaterialStore for MemoryKeyStore {
    fn save(&self, value: &str) -> Result<(), AttestError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| AttestError::Store("key store lock poisoned".into()))?;
        *slot = Some(value.to_string());
        Ok(())
    }

    fn load(&self) -> Result<Option<String>, AttestError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| AttestError::Store("key store lock poisoned".into()))?;
        Ok(slot.clone())
    }

    fn delete(&self) -> Result<(), AttestError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| AttestError::Store("key store lock poisoned".into()))?;
        *slot = None;
        Ok(())
    }
}
