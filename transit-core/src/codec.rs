//! Versioned envelope serialization.
//!
//! Model values and contexts are persisted as
//! `{"version": 1, "kind": "Trip", "data": {...}}`. The kind tag stops a
//! stored context from being decoded as a different type, and the version
//! lets old stores be rejected cleanly. Contexts additionally have a compact
//! token form: the envelope JSON in URL-safe base64 without padding.
//!
//! Decoding never panics and never yields a partial value; model invariants
//! are re-checked on the way in.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Departure, Location, StationDepartures, Trip};
use crate::protocol::{
    ProviderError, QueryJourneyDetailContext, QueryTripsContext, RefreshTripContext,
};

/// Envelope schema version written by this crate.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from decoding envelopes and tokens.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Not JSON, or data that violates the model
    #[error("malformed data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported schema version {found} (expected {SCHEMA_VERSION})")]
    Version { found: u32 },

    #[error("expected a {expected} envelope, found {found}")]
    Kind { expected: &'static str, found: String },

    #[error("invalid token encoding: {0}")]
    Token(#[from] base64::DecodeError),
}

impl From<CodecError> for ProviderError {
    fn from(err: CodecError) -> Self {
        ProviderError::InvalidContext(err.to_string())
    }
}

/// A type that can be stored in an envelope.
pub trait Archive: Serialize + DeserializeOwned {
    /// Tag written to the envelope's `kind` field.
    const KIND: &'static str;
}

impl Archive for Location {
    const KIND: &'static str = "Location";
}

impl Archive for Trip {
    const KIND: &'static str = "Trip";
}

impl Archive for Departure {
    const KIND: &'static str = "Departure";
}

impl Archive for StationDepartures {
    const KIND: &'static str = "StationDepartures";
}

impl Archive for QueryTripsContext {
    const KIND: &'static str = "QueryTripsContext";
}

impl Archive for RefreshTripContext {
    const KIND: &'static str = "RefreshTripContext";
}

impl Archive for QueryJourneyDetailContext {
    const KIND: &'static str = "QueryJourneyDetailContext";
}

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    version: u32,
    kind: &'static str,
    data: &'a T,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    version: u32,
    kind: String,
    data: serde_json::Value,
}

/// Serializes `value` into an envelope.
pub fn encode<T: Archive>(value: &T) -> Result<String, CodecError> {
    let envelope = EnvelopeOut {
        version: SCHEMA_VERSION,
        kind: T::KIND,
        data: value,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parses an envelope of kind `T`.
///
/// # Errors
///
/// Fails on malformed JSON, a foreign version or kind, or data that does not
/// satisfy the model's invariants.
pub fn decode<T: Archive>(input: &str) -> Result<T, CodecError> {
    let envelope: EnvelopeIn = serde_json::from_str(input)?;
    if envelope.version != SCHEMA_VERSION {
        debug!(found = envelope.version, "rejecting envelope version");
        return Err(CodecError::Version {
            found: envelope.version,
        });
    }
    if envelope.kind != T::KIND {
        debug!(expected = T::KIND, found = %envelope.kind, "rejecting envelope kind");
        return Err(CodecError::Kind {
            expected: T::KIND,
            found: envelope.kind,
        });
    }
    Ok(T::deserialize(envelope.data)?)
}

/// Compact token form of [`encode`], safe in URLs and file names.
pub fn encode_token<T: Archive>(value: &T) -> Result<String, CodecError> {
    Ok(URL_SAFE_NO_PAD.encode(encode(value)?))
}

/// Inverse of [`encode_token`].
pub fn decode_token<T: Archive>(token: &str) -> Result<T, CodecError> {
    let bytes = URL_SAFE_NO_PAD.decode(token.trim())?;
    let json = std::str::from_utf8(&bytes)
        .map_err(|e| CodecError::Json(serde::de::Error::custom(e)))?;
    decode(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coordinate, Product};
    use crate::protocol::ContextPayload;
    use proptest::prelude::*;

    fn marienplatz() -> Location {
        Location::named_station("de:09162:2", Some("München"), "Marienplatz")
            .unwrap()
            .with_coord(Coordinate::new(48_137_079, 11_575_447))
            .with_products([Product::Subway, Product::SuburbanTrain].into_iter().collect())
    }

    #[test]
    fn envelope_shape() {
        let json = encode(&marienplatz()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["kind"], "Location");
        assert_eq!(value["data"]["type"], "STATION");
        assert_eq!(value["data"]["id"], "de:09162:2");
        assert_eq!(value["data"]["lat"], 48_137_079);
        assert_eq!(value["data"]["place"], "München");
    }

    #[test]
    fn location_decodes_equal() {
        let location = marienplatz();
        let back: Location = decode(&encode(&location).unwrap()).unwrap();
        assert_eq!(back, location);
        assert_eq!(back.unique_short_name(), "Marienplatz");
    }

    #[test]
    fn rejects_wrong_kind_and_version() {
        let json = encode(&marienplatz()).unwrap();
        let err = decode::<Trip>(&json).unwrap_err();
        assert!(matches!(err, CodecError::Kind { expected: "Trip", .. }));

        let future = json.replacen("\"version\":1", "\"version\":2", 1);
        let err = decode::<Location>(&future).unwrap_err();
        assert!(matches!(err, CodecError::Version { found: 2 }));
    }

    #[test]
    fn rejects_invariant_violations() {
        // An Any location may not carry an id
        let json = r#"{"version":1,"kind":"Location","data":{"type":"ANY","id":"123","name":"x"}}"#;
        assert!(matches!(decode::<Location>(json), Err(CodecError::Json(_))));

        let json = r#"{"version":1,"kind":"Location","data":{"type":"STATION","place":"München"}}"#;
        assert!(decode::<Location>(json).is_err());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode::<Location>("").is_err());
        assert!(decode::<Location>("{\"version\":1}").is_err());
        assert!(matches!(
            decode_token::<QueryTripsContext>("!!not base64!!"),
            Err(CodecError::Token(_))
        ));
    }

    #[test]
    fn context_token() {
        let mut payload = ContextPayload::new();
        payload.insert("page", &2i32).unwrap();
        let ctx = QueryTripsContext::new("stub", true, true).with_payload(payload);

        let token = encode_token(&ctx).unwrap();
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));

        let back: QueryTripsContext = decode_token(&token).unwrap();
        assert_eq!(back, ctx);

        let err: ProviderError = decode_token::<RefreshTripContext>(&token).unwrap_err().into();
        assert!(matches!(err, ProviderError::InvalidContext(_)));
    }

    proptest! {
        #[test]
        fn coord_location_survives(lat in -90_000_000i32..=90_000_000, lon in -180_000_000i32..=180_000_000) {
            let location = Location::coord(Coordinate::new(lat, lon));
            let back: Location = decode(&encode(&location).unwrap()).unwrap();
            prop_assert_eq!(back.coordinate(), Some(Coordinate::new(lat, lon)));
            prop_assert_eq!(back, location);
        }

        #[test]
        fn arbitrary_text_never_panics(input in ".{0,64}") {
            let _ = decode::<Trip>(&input);
            let _ = decode_token::<QueryTripsContext>(&input);
        }
    }
}
