//! Memoization Adapter
//!
//! Wraps a function so its results are served from a [`CacheEngine`]. The
//! endpoint is the function name followed by its JSON-encoded arguments.

use std::marker::PhantomData;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::CacheEngine;

/// A function whose results are cached by argument.
pub struct Memoized<A, T, F> {
    engine: CacheEngine,
    name: String,
    ttl: Option<Duration>,
    func: F,
    _marker: PhantomData<fn(&A) -> T>,
}

impl<A, T, F> Memoized<A, T, F>
where
    A: Serialize,
    T: Serialize + DeserializeOwned,
    F: Fn(&A) -> T,
{
    /// Wraps `func`, caching under `name` with the engine's default TTL.
    pub fn new(engine: CacheEngine, name: impl Into<String>, func: F) -> Self {
        Self {
            engine,
            name: name.into(),
            ttl: None,
            func,
            _marker: PhantomData,
        }
    }

    /// Caches results for `ttl` instead of the default.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Endpoint used for `args`, or `None` if they cannot be JSON encoded.
    pub fn endpoint(&self, args: &A) -> Option<String> {
        match serde_json::to_string(args) {
            Ok(encoded) => Some(format!("{}({})", self.name, encoded)),
            Err(err) => {
                debug!("Arguments to '{}' cannot be encoded: {}", self.name, err);
                None
            }
        }
    }

    /// Returns the cached result for `args`, computing and caching it on a miss.
    ///
    /// Arguments or results that cannot be encoded bypass the cache.
    pub fn call(&self, args: &A) -> T {
        let Some(endpoint) = self.endpoint(args) else {
            return (self.func)(args);
        };

        if let Some(cached) = self.engine.get(&endpoint, "") {
            match serde_json::from_value(cached) {
                Ok(value) => return value,
                Err(err) => debug!("Cached result for '{}' no longer decodes: {}", endpoint, err),
            }
        }

        let value = (self.func)(args);
        match serde_json::to_value(&value) {
            Ok(payload) => {
                // The write lands in the background.
                let _ = self.engine.set(&endpoint, payload, "", self.ttl);
            }
            Err(err) => warn!("Result for '{}' cannot be cached: {}", endpoint, err),
        }
        value
    }
}
