pub mod decode;
pub mod pool;
pub mod reorder;

use serde::Deserialize;

use crate::series::Sample;

/// One message from the feed, owned so it can move across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingress {
    /// JSON envelope text.
    Text(String),
    /// Packed 12-byte records.
    Binary(Vec<u8>),
}

/// Wire form of one sample. Values outside `u32` (negative, fractional,
/// too large) fail to deserialize and the whole envelope is malformed.
#[derive(Debug, Deserialize)]
struct Reading {
    timestamp: i64,
    value: u32,
}

impl From<Reading> for Sample {
    fn from(r: Reading) -> Self {
        Sample {
            timestamp: r.timestamp,
            value: r.value,
        }
    }
}

/// Tagged JSON envelope: `{"type": "...", "payload": {...}}`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "payload")]
enum Envelope {
    Data(Reading),
    Batch { readings: Vec<Reading> },
    /// Handshake traffic sharing the feed; not chart data.
    Signal(serde_json::Value),
}

/// Parse a text envelope into samples. Non-data envelopes yield none.
pub fn parse_envelope(text: &str) -> serde_json::Result<Vec<Sample>> {
    Ok(match serde_json::from_str::<Envelope>(text)? {
        Envelope::Data(r) => vec![r.into()],
        Envelope::Batch { readings } => readings.into_iter().map(Sample::from).collect(),
        Envelope::Signal(_) => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_envelope() {
        let got = parse_envelope(
            r#"{"type":"Data","payload":{"timestamp":1700000000000000000,"value":42}}"#,
        )
        .unwrap();
        assert_eq!(
            got,
            vec![Sample {
                timestamp: 1_700_000_000_000_000_000,
                value: 42
            }]
        );
    }

    #[test]
    fn parses_batch_envelope() {
        let got = parse_envelope(
            r#"{"type":"Batch","payload":{"readings":[
                {"timestamp":1,"value":10},
                {"timestamp":2,"value":20}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].value, 20);
    }

    #[test]
    fn signal_envelope_is_not_data() {
        let got =
            parse_envelope(r#"{"type":"Signal","payload":{"sdp":"v=0","candidate":null}}"#)
                .unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn malformed_text_is_an_error() {
        assert!(parse_envelope("not json").is_err());
        assert!(parse_envelope(r#"{"type":"Data","payload":{"value":1}}"#).is_err());
        assert!(parse_envelope(r#"{"type":"Mystery","payload":{}}"#).is_err());
    }

    #[test]
    fn values_outside_u32_are_rejected() {
        for v in ["-5", "10.9", "5000000000", "\"12\"", "null"] {
            let text = format!(r#"{{"type":"Data","payload":{{"timestamp":1,"value":{v}}}}}"#);
            assert!(parse_envelope(&text).is_err(), "accepted value {v}");
        }
        // one bad reading spoils the batch
        assert!(parse_envelope(
            r#"{"type":"Batch","payload":{"readings":[
                {"timestamp":1,"value":10},
                {"timestamp":2,"value":-1}
            ]}}"#
        )
        .is_err());
    }

    #[test]
    fn u32_max_is_accepted() {
        let got =
            parse_envelope(r#"{"type":"Data","payload":{"timestamp":1,"value":4294967295}}"#)
                .unwrap();
        assert_eq!(got[0].value, u32::MAX);
    }
}
