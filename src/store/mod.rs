//! Backing store connection managers.
//!
//! Each store is an init step: `init` opens the connection (pool) and
//! registers a health probe, `rollback` closes it. The handles are cheap to
//! clone and safe to share once opened.

use std::sync::{Arc, Mutex, PoisonError};

pub mod mongodb;
pub mod mysql;
pub mod redis;

pub use self::mongodb::MongoStep;
pub use self::mysql::MySqlStep;
pub use self::redis::RedisStep;

/// Shared slot for a handle that a rollback must be able to revoke.
///
/// Readers clone the handle out per use; after [`Releasable::release`] they
/// get `None`, so no clone outlives the rollback except one already in use.
#[derive(Debug)]
pub struct Releasable<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for Releasable<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Clone> Releasable<T> {
    pub fn new(handle: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// A clone of the handle, or `None` once released.
    pub fn get(&self) -> Option<T> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Take the handle out for every holder. Returns it the first time only.
    pub fn release(&self) -> Option<T> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}
