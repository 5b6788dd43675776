//! Lock helpers that survive a panicked holder
//!
//! Cache contents are always safe to keep after a panic mid-operation: the
//! worst case is a half-evicted bucket, which the next write trims again.

use crate::error::Result;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Poison-recovering `Mutex::lock`
pub trait MutexExt<T> {
    fn lock_recovered(&self) -> Result<MutexGuard<'_, T>>;
}

/// Poison-recovering `RwLock` accessors
pub trait RwLockExt<T> {
    fn read_recovered(&self) -> Result<RwLockReadGuard<'_, T>>;

    fn write_recovered(&self) -> Result<RwLockWriteGuard<'_, T>>;
}

impl<T> MutexExt<T> for Mutex<T> {
    fn lock_recovered(&self) -> Result<MutexGuard<'_, T>> {
        Ok(self.lock().unwrap_or_else(|poisoned| {
            log::warn!("Mutex poisoned, continuing with inner state");
            poisoned.into_inner()
        }))
    }
}

impl<T> RwLockExt<T> for RwLock<T> {
    fn read_recovered(&self) -> Result<RwLockReadGuard<'_, T>> {
        Ok(self.read().unwrap_or_else(|poisoned| {
            log::warn!("RwLock poisoned on read, continuing with inner state");
            poisoned.into_inner()
        }))
    }

    fn write_recovered(&self) -> Result<RwLockWriteGuard<'_, T>> {
        Ok(self.write().unwrap_or_else(|poisoned| {
            log::warn!("RwLock poisoned on write, continuing with inner state");
            poisoned.into_inner()
        }))
    }
}
