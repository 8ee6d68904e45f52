//! The unit persisted per cache key, and its wire format.
//!
//! A stored blob is one format-version byte followed by the bincode
//! (standard configuration) encoding of a [`ResponseRecord`]. Blobs with any
//! other version byte are rejected rather than guessed at.

use bincode::config;
use bincode::error::{DecodeError, EncodeError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::StatusCode;
use crate::http::headers::HeaderMultimap;

/// Version byte written in front of every encoded record.
pub const FORMAT_VERSION: u8 = 1;

/// Errors from encoding or decoding a [`ResponseRecord`].
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to encode cache record: {0}")]
    Encode(#[from] EncodeError),

    #[error("failed to decode cache record: {0}")]
    Decode(#[from] DecodeError),

    #[error("cache record is empty")]
    Empty,

    #[error("unsupported cache record format version {0}")]
    UnsupportedVersion(u8),

    #[error("cache record has {0} trailing bytes")]
    TrailingBytes(usize),

    #[error("cache record holds unknown status code {0}")]
    UnknownStatus(u16),
}

/// Status, headers and body captured from one handler execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub status: u16,
    pub header: HeaderMultimap,
    pub data: Vec<u8>,
}

impl ResponseRecord {
    pub fn new(status: StatusCode, header: HeaderMultimap, data: impl Into<Vec<u8>>) -> Self {
        Self {
            status: status.as_u16(),
            header,
            data: data.into(),
        }
    }

    /// Returns the stored status as a [`StatusCode`].
    ///
    /// # Errors
    ///
    /// [`RecordError::UnknownStatus`] if the number has no variant.
    pub fn status_code(&self) -> Result<StatusCode, RecordError> {
        StatusCode::from_u16(self.status).ok_or(RecordError::UnknownStatus(self.status))
    }

    /// Merges a later chunk of the same response into this record: the body
    /// grows by `chunk.data`, status and headers take `chunk`'s values.
    pub fn absorb(&mut self, chunk: ResponseRecord) {
        self.data.extend_from_slice(&chunk.data);
        self.status = chunk.status;
        self.header = chunk.header;
    }

    /// Encodes the record into its versioned binary form.
    pub fn encode(&self) -> Result<Bytes, RecordError> {
        let payload = bincode::serde::encode_to_vec(self, config::standard())?;
        let mut buf = Vec::with_capacity(payload.len() + 1);
        buf.push(FORMAT_VERSION);
        buf.extend_from_slice(&payload);
        Ok(Bytes::from(buf))
    }

    /// Decodes a blob produced by [`encode`](Self::encode).
    pub fn decode(blob: &[u8]) -> Result<Self, RecordError> {
        let (&version, payload) = blob.split_first().ok_or(RecordError::Empty)?;
        if version != FORMAT_VERSION {
            return Err(RecordError::UnsupportedVersion(version));
        }
        let (record, read): (Self, usize) =
            bincode::serde::decode_from_slice(payload, config::standard())?;
        if read != payload.len() {
            return Err(RecordError::TrailingBytes(payload.len() - read));
        }
        Ok(record)
    }
}
