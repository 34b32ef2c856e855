//! Avro codec for the published event record
//!
//! The gateway re-shapes the wire [`Event`] into the record the analytics
//! pipeline consumes: the client timestamp is kept verbatim and a server
//! timestamp is stamped at serialization time. Encoding uses single-datum
//! Avro (no container files); the schema travels out of band.

use crate::error::{GatewayError, SendError};
use apache_avro::types::{Record, Value};
use apache_avro::{Schema, from_avro_datum, to_avro_datum};
use std::collections::HashMap;
use virta_core::Event;

const EVENT_SCHEMA: &str = r#"
{
  "type": "record",
  "name": "Event",
  "namespace": "virta",
  "fields": [
    {"name": "id", "type": "string"},
    {"name": "name", "type": "string"},
    {"name": "props", "type": {"type": "map", "values": "string"}},
    {"name": "serverTimestamp", "type": "long"},
    {"name": "clientTimestamp", "type": "long"}
  ]
}
"#;

/// The decoded shape of a published record, used by tests and by the
/// loadtest consumer to verify what actually landed on the log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventRecord {
    pub id: String,
    pub name: String,
    pub props: HashMap<String, String>,
    pub server_timestamp: i64,
    pub client_timestamp: i64,
}

/// Encoder/decoder between the wire [`Event`] and the Avro record
pub struct EventCodec {
    schema: Schema,
}

impl EventCodec {
    /// Parse the record schema. Fails only on a broken build (the schema
    /// is a compile-time constant).
    pub fn new() -> Result<Self, GatewayError> {
        let schema = Schema::parse_str(EVENT_SCHEMA)
            .map_err(|e| GatewayError::Encoding(format!("event schema: {e}")))?;
        Ok(Self { schema })
    }

    /// Encode an event into an Avro datum, stamping `server_timestamp`.
    ///
    /// Deterministic and size-stable for identical inputs and timestamp.
    pub fn encode(&self, event: &Event, server_timestamp: i64) -> Result<Vec<u8>, SendError> {
        let mut record = Record::new(&self.schema)
            .ok_or_else(|| SendError::Encoding("event schema is not a record".to_string()))?;

        let props: HashMap<String, Value> = event
            .props
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        record.put("id", event.id.as_str());
        record.put("name", event.name.as_str());
        record.put("props", Value::Map(props));
        record.put("serverTimestamp", server_timestamp);
        record.put("clientTimestamp", event.timestamp);

        to_avro_datum(&self.schema, record).map_err(|e| SendError::Encoding(e.to_string()))
    }

    /// Decode an Avro datum back into an [`EventRecord`].
    pub fn decode(&self, data: &[u8]) -> Result<EventRecord, GatewayError> {
        let mut reader = data;
        let value = from_avro_datum(&self.schema, &mut reader, None)
            .map_err(|e| GatewayError::Encoding(format!("avro decode: {e}")))?;

        let Value::Record(fields) = value else {
            return Err(GatewayError::Encoding(
                "decoded datum is not a record".to_string(),
            ));
        };

        let mut record = EventRecord::default();
        for (field, value) in fields {
            match (field.as_str(), value) {
                ("id", Value::String(s)) => record.id = s,
                ("name", Value::String(s)) => record.name = s,
                ("props", Value::Map(map)) => {
                    for (k, v) in map {
                        if let Value::String(s) = v {
                            record.props.insert(k, s);
                        }
                    }
                }
                ("serverTimestamp", Value::Long(n)) => record.server_timestamp = n,
                ("clientTimestamp", Value::Long(n)) => record.client_timestamp = n,
                (field, value) => {
                    return Err(GatewayError::Encoding(format!(
                        "unexpected field {field}: {value:?}"
                    )));
                }
            }
        }
        Ok(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_event() -> Event {
        Event {
            id: "01J9AVROTEST00000000000000".to_string(),
            name: "player.levelup".to_string(),
            topic: "progression".to_string(),
            props: HashMap::from([
                ("level".to_string(), "12".to_string()),
                ("region".to_string(), "us-east".to_string()),
            ]),
            timestamp: 1_700_000_123_456,
        }
    }

    #[test]
    fn round_trip_preserves_event_fields() {
        let codec = EventCodec::new().unwrap();
        let event = make_event();

        let encoded = codec.encode(&event, 1_700_000_123_999).unwrap();
        let decoded = codec.decode(&encoded).unwrap();

        assert_eq!(decoded.id, event.id);
        assert_eq!(decoded.name, event.name);
        assert_eq!(decoded.props, event.props);
        assert_eq!(decoded.client_timestamp, event.timestamp);
        assert_eq!(decoded.server_timestamp, 1_700_000_123_999);
    }

    #[test]
    fn encoding_is_deterministic_for_fixed_timestamp() {
        let codec = EventCodec::new().unwrap();
        let mut event = make_event();
        // single prop so map ordering cannot vary
        event.props = HashMap::from([("k".to_string(), "v".to_string())]);

        let a = codec.encode(&event, 42).unwrap();
        let b = codec.encode(&event, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_props_round_trip() {
        let codec = EventCodec::new().unwrap();
        let mut event = make_event();
        event.props.clear();

        let encoded = codec.encode(&event, 1).unwrap();
        let decoded = codec.decode(&encoded).unwrap();
        assert!(decoded.props.is_empty());
    }

    #[test]
    fn decode_rejects_garbage() {
        let codec = EventCodec::new().unwrap();
        assert!(codec.decode(&[0xff, 0x00, 0x01]).is_err());
    }
}
