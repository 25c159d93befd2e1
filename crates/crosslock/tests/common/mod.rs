//! In-memory backend for exercising the mutex façade without a real store.
#![allow(dead_code)] // not every test binary uses every helper

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crosslock::{LockBackend, LockName, LockResult, OwnerToken, Wait};

type LeaseTable = Arc<StdMutex<HashMap<String, (String, Option<Instant>)>>>;

/// One shared lease table. Every [`MemoryBackend`] cloned off it behaves
/// like a separate process talking to the same store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    leases: LeaseTable,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend view onto this store, as the factory would hand out.
    pub fn backend(&self) -> Box<dyn LockBackend> {
        Box::new(MemoryBackend {
            store: self.clone(),
        })
    }

    /// The token currently holding `name`, expired or not.
    pub fn holder(&self, name: &str) -> Option<String> {
        self.leases
            .lock()
            .unwrap()
            .get(name)
            .map(|(token, _)| token.clone())
    }

    fn try_acquire(&self, name: &str, token: &str, ttl: Duration) -> bool {
        let mut leases = self.leases.lock().unwrap();
        if let Some((_, Some(deadline))) = leases.get(name)
            && *deadline <= Instant::now()
        {
            leases.remove(name);
        }
        if leases.contains_key(name) {
            return false;
        }
        leases.insert(
            name.to_string(),
            (token.to_string(), Some(Instant::now() + ttl)),
        );
        true
    }

    fn release(&self, name: &str, token: &str) -> bool {
        let mut leases = self.leases.lock().unwrap();
        match leases.get(name) {
            Some((owner, _)) if owner.as_str() == token => {
                leases.remove(name);
                true
            }
            _ => false,
        }
    }

    fn is_locked(&self, name: &str) -> bool {
        let leases = self.leases.lock().unwrap();
        match leases.get(name) {
            Some((_, Some(deadline))) => *deadline > Instant::now(),
            Some((_, None)) => true,
            None => false,
        }
    }

    fn renew(&self, name: &str, token: &str, extension: Duration) -> bool {
        let mut leases = self.leases.lock().unwrap();
        match leases.get_mut(name) {
            Some((owner, deadline))
                if owner.as_str() == token && deadline.is_none_or(|d| d > Instant::now()) =>
            {
                *deadline = Some(Instant::now() + extension);
                true
            }
            _ => false,
        }
    }
}

/// TTL-capable backend over a [`MemoryStore`], polling at the wait cadence
/// like the Redis key-value backend does.
#[derive(Debug)]
pub struct MemoryBackend {
    store: MemoryStore,
}

#[async_trait]
impl LockBackend for MemoryBackend {
    async fn acquire(
        &mut self,
        name: &LockName,
        token: &OwnerToken,
        ttl: Duration,
        wait: Wait,
    ) -> LockResult<bool> {
        let started = Instant::now();
        loop {
            if self.store.try_acquire(name.as_str(), token.as_str(), ttl) {
                return Ok(true);
            }
            if wait.is_single_attempt() || started.elapsed() >= wait.timeout() {
                return Ok(false);
            }
            let remaining = wait.timeout().saturating_sub(started.elapsed());
            tokio::time::sleep(wait.poll_interval().min(remaining)).await;
        }
    }

    async fn release(&mut self, name: &LockName, token: &OwnerToken) -> LockResult<bool> {
        Ok(self.store.release(name.as_str(), token.as_str()))
    }

    async fn is_locked(&self, name: &LockName) -> LockResult<bool> {
        Ok(self.store.is_locked(name.as_str()))
    }

    async fn renew(
        &mut self,
        name: &LockName,
        token: &OwnerToken,
        extension: Duration,
    ) -> LockResult<bool> {
        Ok(self.store.renew(name.as_str(), token.as_str(), extension))
    }

    fn supports_expiry(&self) -> bool {
        true
    }
}
