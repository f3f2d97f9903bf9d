//! Sessions shared between threads.
//!
//! Loading, editing and assembling all walk the same tree, so a shared
//! session admits one operation at a time. [`SharedAssembler::run_exclusive`]
//! holds the lock for a whole closure, which lets a caller chain several
//! edits and an assemble without another thread interleaving.

use super::PdfAssembler;
use crate::error::{Error, Result};
use std::sync::{Arc, Mutex};

/// A [`PdfAssembler`] behind a mutex.
#[derive(Debug, Clone)]
pub struct SharedAssembler {
    inner: Arc<Mutex<PdfAssembler>>,
}

impl SharedAssembler {
    /// Wrap a session.
    pub fn new(session: PdfAssembler) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Run `f` with exclusive access to the session.
    ///
    /// Fails with [`Error::SessionPoisoned`] if an earlier holder panicked,
    /// since the tree may have been left half edited.
    pub fn run_exclusive<T>(&self, f: impl FnOnce(&mut PdfAssembler) -> Result<T>) -> Result<T> {
        let mut session = self.inner.lock().map_err(|_| Error::SessionPoisoned)?;
        f(&mut session)
    }

    /// Take the session back if no other handle is alive.
    pub fn try_unwrap(self) -> std::result::Result<PdfAssembler, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().map_err(|poisoned| Self::new(poisoned.into_inner())),
            Err(inner) => Err(Self { inner }),
        }
    }
}

impl From<PdfAssembler> for SharedAssembler {
    fn from(session: PdfAssembler) -> Self {
        Self::new(session)
    }
}
