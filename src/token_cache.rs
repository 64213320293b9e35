// sms_relay/src/token_cache.rs
// Storage for the gateway's bearer token.

use std::sync::Mutex;

use tokio::time::Instant;

pub trait TokenCache: Send + Sync {
    /// The cached token, if one is present and still valid.
    fn get(&self,) -> Option<String,>;

    fn set(&self, token: String, valid_until: Instant,);

    fn clear(&self,);
}

#[derive(Debug, Clone,)]
struct CachedToken {
    token:       String,
    valid_until: Instant,
}

/// Process-local cache. Expiry is measured on tokio's monotonic clock.
#[derive(Debug, Default,)]
pub struct InMemoryTokenCache {
    slot: Mutex<Option<CachedToken,>,>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenCache for InMemoryTokenCache {
    fn get(&self,) -> Option<String,> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner(),);
        match slot.as_ref() {
            Some(cached,) if Instant::now() < cached.valid_until => Some(cached.token.clone(),),
            Some(_,) => {
                *slot = None;
                None
            },
            None => None,
        }
    }

    fn set(&self, token: String, valid_until: Instant,) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner(),) = Some(CachedToken { token, valid_until, },);
    }

    fn clear(&self,) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner(),) = None;
    }
}
