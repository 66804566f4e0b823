//! Opaque continuation contexts.
//!
//! A provider hands out a context with each result that can be continued:
//! a trip search (paging), a trip (refresh) or a public leg (journey detail).
//! Callers never look inside; they store the context and pass it back to the
//! provider that issued it. The payload is free-form JSON so each backend can
//! keep whatever its upstream API needs, and the whole context serializes so
//! it survives a process restart.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ProviderError;

/// Backend-specific key/value data carried by a context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextPayload(BTreeMap<String, serde_json::Value>);

impl ContextPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `value` cannot be represented as JSON.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<(), ProviderError> {
        let value = serde_json::to_value(value)
            .map_err(|e| ProviderError::InvalidContext(format!("cannot store {}: {e}", std::any::type_name::<T>())))?;
        self.0.insert(key.into(), value);
        Ok(())
    }

    /// Reads the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the key is missing or holds a different shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ProviderError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| ProviderError::InvalidContext(format!("missing key '{key}'")))?;
        T::deserialize(value).map_err(|e| ProviderError::InvalidContext(format!("key '{key}': {e}")))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rejects a context issued by a different provider.
fn check_issuer(kind: &str, issuer: &str, provider: &str) -> Result<(), ProviderError> {
    if issuer == provider {
        Ok(())
    } else {
        Err(ProviderError::InvalidContext(format!(
            "{kind} was issued by '{issuer}', not '{provider}'"
        )))
    }
}

/// Continuation of a trip search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTripsContext {
    provider: String,
    can_query_later: bool,
    can_query_earlier: bool,
    #[serde(default)]
    payload: ContextPayload,
}

impl QueryTripsContext {
    pub fn new(provider: impl Into<String>, can_query_later: bool, can_query_earlier: bool) -> Self {
        Self {
            provider: provider.into(),
            can_query_later,
            can_query_earlier,
            payload: ContextPayload::new(),
        }
    }

    pub fn with_payload(mut self, payload: ContextPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn can_query_later(&self) -> bool {
        self.can_query_later
    }

    pub fn can_query_earlier(&self) -> bool {
        self.can_query_earlier
    }

    pub fn payload(&self) -> &ContextPayload {
        &self.payload
    }

    /// # Errors
    ///
    /// Returns `InvalidContext` if `provider` did not issue this context.
    pub fn check_issuer(&self, provider: &str) -> Result<(), ProviderError> {
        check_issuer("trips context", &self.provider, provider)
    }
}

/// Handle for re-fetching one trip with fresh real-time data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTripContext {
    provider: String,
    #[serde(default)]
    payload: ContextPayload,
}

impl RefreshTripContext {
    pub fn new(provider: impl Into<String>, payload: ContextPayload) -> Self {
        Self {
            provider: provider.into(),
            payload,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn payload(&self) -> &ContextPayload {
        &self.payload
    }

    /// # Errors
    ///
    /// Returns `InvalidContext` if `provider` did not issue this context.
    pub fn check_issuer(&self, provider: &str) -> Result<(), ProviderError> {
        check_issuer("refresh context", &self.provider, provider)
    }
}

/// Handle for fetching the full run of the vehicle serving a leg or departure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryJourneyDetailContext {
    provider: String,
    #[serde(default)]
    payload: ContextPayload,
}

impl QueryJourneyDetailContext {
    pub fn new(provider: impl Into<String>, payload: ContextPayload) -> Self {
        Self {
            provider: provider.into(),
            payload,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn payload(&self) -> &ContextPayload {
        &self.payload
    }

    /// # Errors
    ///
    /// Returns `InvalidContext` if `provider` did not issue this context.
    pub fn check_issuer(&self, provider: &str) -> Result<(), ProviderError> {
        check_issuer("journey detail context", &self.provider, provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_values() {
        let mut payload = ContextPayload::new();
        payload.insert("page", &3i32).unwrap();
        payload.insert("ctxRecon", &"¶HKI¶T$A=1@O=Aachen").unwrap();

        assert_eq!(payload.get::<i32>("page").unwrap(), 3);
        assert_eq!(payload.get::<String>("ctxRecon").unwrap(), "¶HKI¶T$A=1@O=Aachen");
        assert!(payload.contains_key("page"));

        let missing = payload.get::<i32>("nope").unwrap_err();
        assert!(missing.to_string().contains("missing key 'nope'"));

        let wrong = payload.get::<i32>("ctxRecon").unwrap_err();
        assert!(matches!(wrong, ProviderError::InvalidContext(_)));
    }

    #[test]
    fn issuer_check() {
        let ctx = QueryTripsContext::new("vbb", true, false);
        assert!(ctx.check_issuer("vbb").is_ok());

        let err = ctx.check_issuer("bvg").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid context: trips context was issued by 'vbb', not 'bvg'"
        );

        let refresh = RefreshTripContext::new("db", ContextPayload::new());
        assert!(refresh.check_issuer("sbb").is_err());
    }

    #[test]
    fn context_json_shape() {
        let mut payload = ContextPayload::new();
        payload.insert("page", &0i32).unwrap();
        let ctx = QueryTripsContext::new("stub", true, true).with_payload(payload);

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["provider"], "stub");
        assert_eq!(json["canQueryLater"], true);
        assert_eq!(json["payload"]["page"], 0);

        let back: QueryTripsContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }
}
