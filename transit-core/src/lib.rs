//! Canonical model and query protocol for public-transit backends.
//!
//! Backend adapters translate their upstream APIs into the types in
//! [`domain`] and implement [`protocol::NetworkProvider`]. Callers get one
//! result taxonomy and one set of opaque contexts for paging, refreshing and
//! journey detail, whatever network they talk to.

pub mod cache;
pub mod codec;
pub mod domain;
pub mod protocol;
pub mod store;
pub mod stub;
