//! # Formats Module
//!
//! Byte-level encodings used by the stores.

pub mod persistence;

pub use persistence::{
    list_from_json_bytes, records_from_bytes, records_to_bytes, to_json_bytes,
};
