//! Log line encoding
//!
//! Every record becomes exactly one newline-terminated line. Signals appear
//! in the order the decoder produced them.

use crate::config::LogFormat;
use crate::types::DecodedRecord;
use chrono::SecondsFormat;
use std::fmt::Write as FmtWrite;

/// Encode a record as one log line, including the trailing newline
pub fn encode_line(format: LogFormat, record: &DecodedRecord) -> String {
    match format {
        LogFormat::KeyValue => encode_key_value(record),
        LogFormat::JsonLines => encode_json(record),
    }
}

fn timestamp(record: &DecodedRecord) -> String {
    record.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode_key_value(record: &DecodedRecord) -> String {
    let mut line = format!(
        "timestamp={} id=0x{:X} message={}",
        timestamp(record),
        record.id,
        record.message
    );
    for (name, value) in &record.fields {
        let _ = write!(line, " {}={}", name, value);
    }
    line.push('\n');
    line
}

fn encode_json(record: &DecodedRecord) -> String {
    let mut signals = serde_json::Map::with_capacity(record.fields.len());
    for (name, value) in &record.fields {
        // Non-finite floats have no JSON form
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        signals.insert(name.clone(), value);
    }

    let mut object = serde_json::Map::with_capacity(4);
    object.insert("timestamp".into(), timestamp(record).into());
    object.insert("id".into(), record.id.into());
    object.insert("message".into(), record.message.clone().into());
    object.insert("signals".into(), serde_json::Value::Object(signals));

    let mut line = serde_json::Value::Object(object).to_string();
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalValue;
    use chrono::{TimeZone, Utc};

    fn record() -> DecodedRecord {
        DecodedRecord {
            id: 0x100,
            message: "VehicleSpeed".into(),
            fields: vec![
                ("speed".into(), SignalValue::Float(10.0)),
                ("gear".into(), SignalValue::Choice("Drive".into())),
                ("odometer".into(), SignalValue::Integer(1234)),
            ],
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_key_value_line() {
        let line = encode_line(LogFormat::KeyValue, &record());
        assert_eq!(
            line,
            "timestamp=2024-05-01T12:00:00.000000Z id=0x100 message=VehicleSpeed \
             speed=10.0 gear=\"Drive\" odometer=1234\n"
        );
    }

    #[test]
    fn test_json_line_keeps_signal_order() {
        let line = encode_line(LogFormat::JsonLines, &record());
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let speed = line.find("\"speed\"").unwrap();
        let gear = line.find("\"gear\"").unwrap();
        let odometer = line.find("\"odometer\"").unwrap();
        assert!(speed < gear && gear < odometer);

        let parsed: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(parsed["signals"]["speed"], 10.0);
        assert_eq!(parsed["signals"]["gear"], "Drive");
        assert_eq!(parsed["id"], 256);
    }

    #[test]
    fn test_non_finite_float_in_json() {
        let mut rec = record();
        rec.fields = vec![("bad".into(), SignalValue::Float(f64::NAN))];
        let line = encode_line(LogFormat::JsonLines, &rec);
        assert!(line.contains("\"bad\":null"));
    }
}
