//! Signal database
//!
//! A [`Schema`] maps frame identifiers to decode rules. It is loaded once at
//! startup and shared read-only (behind an `Arc`) for the lifetime of the
//! process.
//!
//! # File Format
//!
//! Schemas are TOML files:
//!
//! ```toml
//! [[messages]]
//! id = 0x100
//! name = "VehicleSpeed"
//! dlc = 2
//!
//! [[messages.signals]]
//! name = "speed"
//! start_bit = 0
//! length = 16
//! scale = 0.1
//! unit = "km/h"
//!
//! [[messages.signals]]
//! name = "gear"
//! start_bit = 8
//! length = 8
//! byte_order = "big_endian"
//! choices = { "0" = "Park", "1" = "Drive" }
//! ```
//!
//! `byte_order` defaults to `little_endian`, `signed` to `false`, `scale` to
//! `1.0` and `offset` to `0.0`. Big-endian start bits use DBC numbering
//! (the most significant bit of the signal).

pub mod decoder;

pub use decoder::{encode_raw, SchemaDecoder};

use crate::error::{CanLogError, Result, ResultExt};
use crate::types::MAX_PAYLOAD_LEN;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Bit numbering of a signal within the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Intel layout, `start_bit` is the least significant bit
    #[default]
    LittleEndian,
    /// Motorola layout, `start_bit` is the most significant bit
    BigEndian,
}

/// Decode rule for one signal
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRule {
    pub name: String,
    pub start_bit: u16,
    pub length: u16,
    pub byte_order: ByteOrder,
    pub signed: bool,
    pub scale: f64,
    pub offset: f64,
    pub unit: Option<String>,
    /// Raw value to label
    pub choices: BTreeMap<i64, String>,
}

impl SignalRule {
    /// True when the physical value equals the raw integer
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.offset == 0.0
    }

    /// Bit range occupied by the signal, as (first, last) positions in
    /// big-endian linear numbering for Motorola signals and little-endian
    /// numbering for Intel signals
    fn bit_span(&self) -> (u32, u32) {
        let start = self.start_bit as u32;
        let length = self.length as u32;
        match self.byte_order {
            ByteOrder::LittleEndian => (start, start + length - 1),
            ByteOrder::BigEndian => {
                let msb = (start / 8) * 8 + (7 - start % 8);
                (msb, msb + length - 1)
            }
        }
    }
}

/// Decode rule for one frame identifier
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRule {
    pub id: u32,
    pub name: String,
    /// Expected payload length
    pub dlc: usize,
    /// Signals in output order
    pub signals: Vec<SignalRule>,
}

/// Immutable identifier to rule mapping
#[derive(Debug, Clone, Default)]
pub struct Schema {
    messages: HashMap<u32, MessageRule>,
    /// Identifiers in file order
    order: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    messages: Vec<MessageEntry>,
}

#[derive(Debug, Deserialize)]
struct MessageEntry {
    id: u32,
    name: String,
    dlc: usize,
    #[serde(default)]
    signals: Vec<SignalEntry>,
}

#[derive(Debug, Deserialize)]
struct SignalEntry {
    name: String,
    start_bit: u16,
    length: u16,
    #[serde(default)]
    byte_order: ByteOrder,
    #[serde(default)]
    signed: bool,
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default)]
    offset: f64,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    choices: BTreeMap<String, String>,
}

fn default_scale() -> f64 {
    1.0
}

impl Schema {
    /// Load a schema file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CanLogError::Schema(format!("Failed to read schema {:?}: {}", path, e))
        })?;

        let schema = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load schema {:?}", path))?;

        tracing::info!(
            "Loaded schema {:?} with {} messages",
            path,
            schema.messages.len()
        );
        Ok(schema)
    }

    /// Parse and validate a schema from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: SchemaFile = toml::from_str(content)
            .map_err(|e| CanLogError::Schema(format!("Failed to parse schema: {}", e)))?;

        let mut schema = Schema::default();
        for entry in file.messages {
            schema.insert(build_message(entry)?)?;
        }
        Ok(schema)
    }

    /// Build a schema from already constructed rules
    pub fn from_messages(messages: impl IntoIterator<Item = MessageRule>) -> Result<Self> {
        let mut schema = Schema::default();
        for message in messages {
            validate_message(&message)?;
            schema.insert(message)?;
        }
        Ok(schema)
    }

    fn insert(&mut self, message: MessageRule) -> Result<()> {
        if self.messages.contains_key(&message.id) {
            return Err(CanLogError::Schema(format!(
                "Duplicate message identifier 0x{:X}",
                message.id
            )));
        }
        self.order.push(message.id);
        self.messages.insert(message.id, message);
        Ok(())
    }

    /// Rule for an identifier
    pub fn message(&self, id: u32) -> Option<&MessageRule> {
        self.messages.get(&id)
    }

    /// Messages in file order
    pub fn messages(&self) -> impl Iterator<Item = &MessageRule> {
        self.order.iter().filter_map(|id| self.messages.get(id))
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when no messages are defined
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn build_message(entry: MessageEntry) -> Result<MessageRule> {
    let mut signals = Vec::with_capacity(entry.signals.len());
    for signal in entry.signals {
        let mut choices = BTreeMap::new();
        for (raw, label) in signal.choices {
            let key = raw.trim().parse::<i64>().map_err(|_| {
                CanLogError::Schema(format!(
                    "Signal '{}' has non-integer choice key '{}'",
                    signal.name, raw
                ))
            })?;
            choices.insert(key, label);
        }
        signals.push(SignalRule {
            name: signal.name,
            start_bit: signal.start_bit,
            length: signal.length,
            byte_order: signal.byte_order,
            signed: signal.signed,
            scale: signal.scale,
            offset: signal.offset,
            unit: signal.unit,
            choices,
        });
    }

    let message = MessageRule {
        id: entry.id,
        name: entry.name,
        dlc: entry.dlc,
        signals,
    };
    validate_message(&message)?;
    Ok(message)
}

fn validate_message(message: &MessageRule) -> Result<()> {
    if message.dlc > MAX_PAYLOAD_LEN {
        return Err(CanLogError::Schema(format!(
            "Message '{}' declares dlc {} (max {})",
            message.name, message.dlc, MAX_PAYLOAD_LEN
        )));
    }

    let payload_bits = (message.dlc * 8) as u32;
    let mut seen = std::collections::HashSet::new();
    for signal in &message.signals {
        if !seen.insert(signal.name.as_str()) {
            return Err(CanLogError::Schema(format!(
                "Message '{}' defines signal '{}' twice",
                message.name, signal.name
            )));
        }
        if signal.length == 0 || signal.length > 64 {
            return Err(CanLogError::Schema(format!(
                "Signal '{}' has invalid length {}",
                signal.name, signal.length
            )));
        }
        if signal.start_bit >= 64 {
            return Err(CanLogError::Schema(format!(
                "Signal '{}' starts at bit {}",
                signal.name, signal.start_bit
            )));
        }
        let (_, last) = signal.bit_span();
        if last >= payload_bits {
            return Err(CanLogError::Schema(format!(
                "Signal '{}' does not fit in {} byte payload of '{}'",
                signal.name, message.dlc, message.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEED_SCHEMA: &str = r#"
        [[messages]]
        id = 0x100
        name = "VehicleSpeed"
        dlc = 2

        [[messages.signals]]
        name = "speed"
        start_bit = 0
        length = 16
        scale = 0.1
        unit = "km/h"
    "#;

    #[test]
    fn test_parse_minimal_schema() {
        let schema = Schema::from_toml_str(SPEED_SCHEMA).unwrap();
        assert_eq!(schema.len(), 1);

        let message = schema.message(0x100).unwrap();
        assert_eq!(message.name, "VehicleSpeed");
        assert_eq!(message.dlc, 2);
        assert_eq!(message.signals[0].scale, 0.1);
        assert_eq!(message.signals[0].byte_order, ByteOrder::LittleEndian);
        assert!(!message.signals[0].signed);
    }

    #[test]
    fn test_choices_are_parsed() {
        let schema = Schema::from_toml_str(
            r#"
            [[messages]]
            id = 0x200
            name = "Gearbox"
            dlc = 1
            [[messages.signals]]
            name = "gear"
            start_bit = 0
            length = 8
            choices = { "0" = "Park", "1" = "Drive" }
            "#,
        )
        .unwrap();

        let gear = &schema.message(0x200).unwrap().signals[0];
        assert_eq!(gear.choices.get(&1).map(String::as_str), Some("Drive"));
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let doubled = format!("{}\n{}", SPEED_SCHEMA, SPEED_SCHEMA);
        let err = Schema::from_toml_str(&doubled).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_signal_outside_payload_rejected() {
        let err = Schema::from_toml_str(
            r#"
            [[messages]]
            id = 0x1
            name = "Short"
            dlc = 1
            [[messages.signals]]
            name = "wide"
            start_bit = 4
            length = 8
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not fit"));
    }

    #[test]
    fn test_big_endian_span_check() {
        // Motorola signal starting at bit 7 with 16 bits covers bytes 0 and 1
        let ok = MessageRule {
            id: 1,
            name: "M".into(),
            dlc: 2,
            signals: vec![SignalRule {
                name: "s".into(),
                start_bit: 7,
                length: 16,
                byte_order: ByteOrder::BigEndian,
                signed: false,
                scale: 1.0,
                offset: 0.0,
                unit: None,
                choices: BTreeMap::new(),
            }],
        };
        assert!(Schema::from_messages(vec![ok.clone()]).is_ok());

        let mut too_short = ok;
        too_short.dlc = 1;
        assert!(Schema::from_messages(vec![too_short]).is_err());
    }

    #[test]
    fn test_messages_keep_file_order() {
        let schema = Schema::from_toml_str(
            r#"
            [[messages]]
            id = 0x300
            name = "C"
            dlc = 0
            [[messages]]
            id = 0x100
            name = "A"
            dlc = 0
            "#,
        )
        .unwrap();
        let names: Vec<_> = schema.messages().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Schema::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err.root(), CanLogError::Schema(_)));
    }
}
