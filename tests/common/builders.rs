//! Test data builders for schemas, frames and configs

use canlog_rs::config::{AppConfig, VirtualBusConfig};
use canlog_rs::schema::{ByteOrder, MessageRule, Schema, SignalRule};
use canlog_rs::types::RawFrame;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Identifier of the speed message in [`speed_schema`]
pub const SPEED_ID: u32 = 0x100;

/// Builder for creating test signal rules
pub struct SignalBuilder {
    rule: SignalRule,
}

impl SignalBuilder {
    pub fn new(name: &str, start_bit: u16, length: u16) -> Self {
        Self {
            rule: SignalRule {
                name: name.to_string(),
                start_bit,
                length,
                byte_order: ByteOrder::LittleEndian,
                signed: false,
                scale: 1.0,
                offset: 0.0,
                unit: None,
                choices: BTreeMap::new(),
            },
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.rule.byte_order = ByteOrder::BigEndian;
        self
    }

    pub fn signed(mut self) -> Self {
        self.rule.signed = true;
        self
    }

    pub fn scale(mut self, scale: f64, offset: f64) -> Self {
        self.rule.scale = scale;
        self.rule.offset = offset;
        self
    }

    pub fn choice(mut self, raw: i64, label: &str) -> Self {
        self.rule.choices.insert(raw, label.to_string());
        self
    }

    pub fn build(self) -> SignalRule {
        self.rule
    }
}

/// Builder for creating test schemas
#[derive(Default)]
pub struct SchemaBuilder {
    messages: Vec<MessageRule>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, id: u32, name: &str, dlc: usize, signals: Vec<SignalRule>) -> Self {
        self.messages.push(MessageRule {
            id,
            name: name.to_string(),
            dlc,
            signals,
        });
        self
    }

    pub fn build(self) -> Arc<Schema> {
        Arc::new(Schema::from_messages(self.messages).expect("valid test schema"))
    }
}

/// One 16-bit little-endian speed signal scaled by 0.1
pub fn speed_schema() -> Arc<Schema> {
    SchemaBuilder::new()
        .message(
            SPEED_ID,
            "VehicleSpeed",
            2,
            vec![SignalBuilder::new("speed", 0, 16).scale(0.1, 0.0).build()],
        )
        .build()
}

/// A speed frame carrying `raw`
pub fn speed_frame(raw: u16) -> RawFrame {
    RawFrame::new(SPEED_ID, &raw.to_le_bytes())
}

/// Config with a short receive timeout so stop is seen quickly
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.acquisition.receive_timeout_ms = 20;
    config.virtual_bus = VirtualBusConfig {
        interval_ms: 1,
        frame_limit: 0,
    };
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_schema() {
        let schema = speed_schema();
        let rule = schema.message(SPEED_ID).unwrap();
        assert_eq!(rule.name, "VehicleSpeed");
        assert_eq!(rule.signals[0].scale, 0.1);
    }
}
