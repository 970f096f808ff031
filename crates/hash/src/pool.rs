//! Fixed-size connection pool
//!
//! Each connection sits behind its own mutex. Checkout starts at a rotating
//! slot and takes the first idle connection; when every slot is busy it
//! waits on the starting slot.

use parking_lot::{Mutex, MutexGuard};
use recmap_core::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pool of `size` connections opened up front
pub struct ConnectionPool<T> {
    slots: Vec<Mutex<T>>,
    next: AtomicUsize,
}

impl<T> ConnectionPool<T> {
    /// Pool over already-open connections
    ///
    /// # Errors
    ///
    /// `Validation` when `conns` is empty.
    pub fn new(conns: Vec<T>) -> Result<Self> {
        if conns.is_empty() {
            return Err(Error::Validation(
                "connection pool needs at least one connection".to_string(),
            ));
        }
        Ok(ConnectionPool {
            slots: conns.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
        })
    }

    /// Open `size` connections with `open`
    pub fn open(size: usize, mut open: impl FnMut() -> Result<T>) -> Result<Self> {
        let conns = (0..size).map(|_| open()).collect::<Result<Vec<_>>>()?;
        Self::new(conns)
    }

    /// Number of connections
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Check out a connection until the guard drops
    pub fn get(&self) -> MutexGuard<'_, T> {
        let start = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        for offset in 0..self.slots.len() {
            let slot = &self.slots[(start + offset) % self.slots.len()];
            if let Some(guard) = slot.try_lock() {
                return guard;
            }
        }
        self.slots[start].lock()
    }
}

impl<T> std::fmt::Debug for ConnectionPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("size", &self.size())
            .finish()
    }
}
