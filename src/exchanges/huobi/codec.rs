use crate::core::errors::ExchangeError;
use crate::core::kernel::WsCodec;
use crate::exchanges::huobi::types::{HuobiMarketDepth, HuobiWsDepthUpdate};
use flate2::read::GzDecoder;
use serde_json::{json, Value};
use std::io::Read;
use tokio_tungstenite::tungstenite::Message;

/// Messages decoded from the Huobi market data stream
#[derive(Debug, Clone)]
pub enum HuobiMessage {
    /// Application-level keepalive; must be answered with a pong
    Ping(i64),
    /// Incremental depth update with sequence numbers
    DepthUpdate {
        channel: String,
        tick: HuobiWsDepthUpdate,
    },
    /// Full depth image from a non-incremental depth channel
    DepthSnapshot {
        channel: String,
        tick: HuobiMarketDepth,
    },
    /// Subscription acknowledgement
    SubResponse {
        id: Option<String>,
        status: String,
        subbed: Option<String>,
    },
    Unknown,
}

/// Codec for Huobi's market data protocol.
///
/// Data frames arrive gzip-compressed in binary messages. Keepalives are
/// application-level `{"ping": n}` frames inside the compressed payload, so
/// they surface as [`HuobiMessage::Ping`] for the consumer to answer rather
/// than being handled by the transport.
pub struct HuobiCodec;

impl HuobiCodec {
    /// Build the pong frame answering a ping
    pub fn encode_pong(value: i64) -> Message {
        Message::Text(json!({ "pong": value }).to_string())
    }

    fn decompress(data: &[u8]) -> Result<String, ExchangeError> {
        let mut decoder = GzDecoder::new(data);
        let mut text = String::new();
        match decoder.read_to_string(&mut text) {
            Ok(_) => Ok(text),
            // Some gateways send uncompressed binary frames
            Err(_) => String::from_utf8(data.to_vec()).map_err(|e| {
                ExchangeError::DeserializationError(format!(
                    "Binary message is neither gzip nor UTF-8: {}",
                    e
                ))
            }),
        }
    }

    fn decode_text(&self, text: &str) -> Result<Option<HuobiMessage>, ExchangeError> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            ExchangeError::DeserializationError(format!("Failed to parse JSON: {}", e))
        })?;

        if let Some(ping) = value.get("ping").and_then(Value::as_i64) {
            return Ok(Some(HuobiMessage::Ping(ping)));
        }

        if let Some(status) = value.get("status").and_then(Value::as_str) {
            if value.get("ch").is_none() {
                return Ok(Some(HuobiMessage::SubResponse {
                    id: value
                        .get("id")
                        .and_then(Value::as_str)
                        .map(ToString::to_string),
                    status: status.to_string(),
                    subbed: value
                        .get("subbed")
                        .and_then(Value::as_str)
                        .map(ToString::to_string),
                }));
            }
        }

        // Channel push: {"ch": "market.btcusdt.mbp.20", "tick": {...}}
        // Snapshot reply to a req: {"rep": "market.btcusdt.mbp.20", "data": {...}}
        let (channel, payload) = if let Some(channel) = value.get("ch").and_then(Value::as_str) {
            (channel, value.get("tick"))
        } else if let Some(channel) = value.get("rep").and_then(Value::as_str) {
            (channel, value.get("data"))
        } else {
            return Ok(Some(HuobiMessage::Unknown));
        };

        let Some(payload) = payload else {
            return Ok(Some(HuobiMessage::Unknown));
        };

        if !channel.contains(".mbp.") && !channel.contains(".depth.") {
            return Ok(Some(HuobiMessage::Unknown));
        }

        // Incremental updates carry sequence numbers; plain depth channels
        // push full images
        if payload.get("seqNum").is_some() {
            let tick: HuobiWsDepthUpdate =
                serde_json::from_value(payload.clone()).map_err(|e| {
                    ExchangeError::DeserializationError(format!(
                        "Failed to parse depth update: {}",
                        e
                    ))
                })?;
            Ok(Some(HuobiMessage::DepthUpdate {
                channel: channel.to_string(),
                tick,
            }))
        } else {
            let tick: HuobiMarketDepth = serde_json::from_value(payload.clone()).map_err(|e| {
                ExchangeError::DeserializationError(format!("Failed to parse depth: {}", e))
            })?;
            Ok(Some(HuobiMessage::DepthSnapshot {
                channel: channel.to_string(),
                tick,
            }))
        }
    }
}

impl WsCodec for HuobiCodec {
    type Message = HuobiMessage;

    fn encode_subscription(
        &self,
        streams: &[impl AsRef<str> + Send + Sync],
    ) -> Result<Message, ExchangeError> {
        // The protocol accepts one channel per frame
        let [stream] = streams else {
            return Err(ExchangeError::InvalidParameters(
                "Huobi subscribes one channel per frame".to_string(),
            ));
        };
        let channel = stream.as_ref();
        Ok(Message::Text(
            json!({ "sub": channel, "id": channel }).to_string(),
        ))
    }

    fn encode_unsubscription(
        &self,
        streams: &[impl AsRef<str> + Send + Sync],
    ) -> Result<Message, ExchangeError> {
        let [stream] = streams else {
            return Err(ExchangeError::InvalidParameters(
                "Huobi unsubscribes one channel per frame".to_string(),
            ));
        };
        let channel = stream.as_ref();
        Ok(Message::Text(
            json!({ "unsub": channel, "id": channel }).to_string(),
        ))
    }

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError> {
        let text = match message {
            Message::Text(text) => text,
            Message::Binary(data) => Self::decompress(&data)?,
            _ => return Ok(None),
        };
        self.decode_text(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn subscription_frame_names_the_channel() {
        let codec = HuobiCodec;
        let message = codec
            .encode_subscription(&["market.btcusdt.mbp.20"])
            .unwrap();
        let Message::Text(text) = message else {
            panic!("expected text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["sub"], "market.btcusdt.mbp.20");
    }

    #[test]
    fn multi_channel_subscription_is_rejected() {
        let codec = HuobiCodec;
        assert!(codec
            .encode_subscription(&["market.btcusdt.mbp.20", "market.ethusdt.mbp.20"])
            .is_err());
    }

    #[test]
    fn ping_decodes_and_pong_echoes_the_value() {
        let codec = HuobiCodec;
        let decoded = codec
            .decode_message(Message::Text(r#"{"ping": 1693526400000}"#.to_string()))
            .unwrap();
        let Some(HuobiMessage::Ping(value)) = decoded else {
            panic!("expected ping");
        };
        assert_eq!(value, 1_693_526_400_000);

        let Message::Text(pong) = HuobiCodec::encode_pong(value) else {
            panic!("expected text frame");
        };
        let parsed: Value = serde_json::from_str(&pong).unwrap();
        assert_eq!(parsed["pong"], 1_693_526_400_000_i64);
    }

    #[test]
    fn incremental_update_decodes_with_sequence_link() {
        let codec = HuobiCodec;
        let frame = r#"{
            "ch": "market.btcusdt.mbp.20",
            "ts": 1693526400000,
            "tick": {
                "seqNum": 101,
                "prevSeqNum": 100,
                "bids": [[26000.5, 1.2]],
                "asks": [[26001.0, 0.0]]
            }
        }"#;
        let decoded = codec.decode_message(Message::Text(frame.to_string())).unwrap();
        let Some(HuobiMessage::DepthUpdate { channel, tick }) = decoded else {
            panic!("expected depth update");
        };
        assert_eq!(channel, "market.btcusdt.mbp.20");
        assert_eq!(tick.seq_num, 101);
        assert_eq!(tick.prev_seq_num, Some(100));
        assert_eq!(tick.bids[0][0], dec!(26000.5));
        assert_eq!(tick.asks[0][1], dec!(0));
    }

    #[test]
    fn full_depth_push_decodes_as_snapshot() {
        let codec = HuobiCodec;
        let frame = r#"{
            "ch": "market.btcusdt.depth.step0",
            "tick": {
                "version": 99,
                "ts": 1693526400000,
                "bids": [[26000.5, 1.2]],
                "asks": [[26001.0, 0.8]]
            }
        }"#;
        let decoded = codec.decode_message(Message::Text(frame.to_string())).unwrap();
        let Some(HuobiMessage::DepthSnapshot { tick, .. }) = decoded else {
            panic!("expected depth snapshot");
        };
        assert_eq!(tick.version, Some(99));
    }

    #[test]
    fn subscription_ack_decodes() {
        let codec = HuobiCodec;
        let frame = r#"{"id":"market.btcusdt.mbp.20","status":"ok","subbed":"market.btcusdt.mbp.20","ts":1693526400000}"#;
        let decoded = codec.decode_message(Message::Text(frame.to_string())).unwrap();
        let Some(HuobiMessage::SubResponse { status, subbed, .. }) = decoded else {
            panic!("expected sub response");
        };
        assert_eq!(status, "ok");
        assert_eq!(subbed.as_deref(), Some("market.btcusdt.mbp.20"));
    }

    #[test]
    fn gzip_frames_are_decompressed() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"ping": 42}"#).unwrap();
        let compressed = encoder.finish().unwrap();

        let codec = HuobiCodec;
        let decoded = codec.decode_message(Message::Binary(compressed)).unwrap();
        assert!(matches!(decoded, Some(HuobiMessage::Ping(42))));
    }
}
