//! Frame decoder
//!
//! Turns a [`RawFrame`] into a [`DecodedRecord`] using a shared [`Schema`].
//! Decoding is a pure function of the schema, the frame and the supplied
//! timestamp.

use super::{ByteOrder, Schema, SignalRule};
use crate::error::{CanLogError, Result};
use crate::types::{DecodedRecord, RawFrame, SignalValue, MAX_PAYLOAD_LEN};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Decodes frames against a schema
#[derive(Debug, Clone)]
pub struct SchemaDecoder {
    schema: Arc<Schema>,
}

impl SchemaDecoder {
    /// Create a decoder sharing the given schema
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    /// The schema in use
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Decode one frame
    ///
    /// Fails with [`CanLogError::UnknownIdentifier`] when the schema has no
    /// rule for the frame and [`CanLogError::MalformedPayload`] when the
    /// payload length differs from the rule's `dlc`.
    pub fn decode(&self, frame: &RawFrame, timestamp: DateTime<Utc>) -> Result<DecodedRecord> {
        let rule = self
            .schema
            .message(frame.id)
            .ok_or(CanLogError::UnknownIdentifier { id: frame.id })?;

        if frame.len() != rule.dlc {
            return Err(CanLogError::MalformedPayload {
                id: frame.id,
                expected: rule.dlc,
                actual: frame.len(),
            });
        }

        let payload = frame.payload();
        let mut padded = [0u8; MAX_PAYLOAD_LEN];
        padded[..payload.len()].copy_from_slice(payload);

        let fields = rule
            .signals
            .iter()
            .map(|signal| (signal.name.clone(), decode_signal(signal, &padded)))
            .collect();

        Ok(DecodedRecord {
            id: frame.id,
            message: rule.name.clone(),
            fields,
            timestamp,
        })
    }
}

/// Extract, sign-extend and scale one signal
fn decode_signal(signal: &SignalRule, payload: &[u8; MAX_PAYLOAD_LEN]) -> SignalValue {
    let raw = extract_bits(signal, payload);
    let length = signal.length as u32;

    let value = if signal.signed && length < 64 {
        let shift = 64 - length;
        ((raw << shift) as i64) >> shift
    } else {
        raw as i64
    };

    if let Some(label) = signal.choices.get(&value) {
        return SignalValue::Choice(label.clone());
    }

    if signal.is_identity() {
        SignalValue::Integer(value)
    } else {
        let base = if signal.signed {
            value as f64
        } else {
            raw as f64
        };
        SignalValue::Float(base * signal.scale + signal.offset)
    }
}

/// Bit mask and shift of a signal within the payload word
///
/// Intel signals are shifted within the little-endian word, Motorola
/// signals within the big-endian word.
fn placement(signal: &SignalRule) -> (u64, u32) {
    let length = signal.length as u32;
    let mask = if length >= 64 {
        u64::MAX
    } else {
        (1u64 << length) - 1
    };
    let start = signal.start_bit as u32;

    let shift = match signal.byte_order {
        ByteOrder::LittleEndian => start,
        ByteOrder::BigEndian => {
            let msb = (start / 8) * 8 + (7 - start % 8);
            63 - (msb + length - 1)
        }
    };
    (mask, shift)
}

fn extract_bits(signal: &SignalRule, payload: &[u8; MAX_PAYLOAD_LEN]) -> u64 {
    let (mask, shift) = placement(signal);
    let word = match signal.byte_order {
        ByteOrder::LittleEndian => u64::from_le_bytes(*payload),
        ByteOrder::BigEndian => u64::from_be_bytes(*payload),
    };
    (word >> shift) & mask
}

/// Place a raw (unscaled) value into a payload
///
/// The inverse of decoding. Bits outside the signal are left alone and
/// bits of `raw` above the signal length are discarded.
pub fn encode_raw(signal: &SignalRule, raw: u64, payload: &mut [u8; MAX_PAYLOAD_LEN]) {
    let (mask, shift) = placement(signal);
    let update = |word: u64| (word & !(mask << shift)) | ((raw & mask) << shift);
    *payload = match signal.byte_order {
        ByteOrder::LittleEndian => update(u64::from_le_bytes(*payload)).to_le_bytes(),
        ByteOrder::BigEndian => update(u64::from_be_bytes(*payload)).to_be_bytes(),
    };
}
