use mrpc::Value;
use thiserror::Error;

use crate::MsgToContext;

/// Errors from encoding/decoding context messages.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided value was not a binary payload.
    #[error("expected binary message payload, got {0:?}")]
    InvalidValueType(Value),
    /// Deserialization via rmp_serde failed.
    #[error(transparent)]
    Decode(#[from] rmp_serde::decode::Error),
    /// Serialization via rmp_serde failed.
    #[error(transparent)]
    Encode(#[from] rmp_serde::encode::Error),
}

/// Encode a `MsgToContext` into an `mrpc::Value` as a binary payload.
pub fn msg_to_value(msg: &MsgToContext) -> Result<Value, Error> {
    let bytes = rmp_serde::to_vec_named(msg)?;
    Ok(Value::Binary(bytes))
}

/// Decode an `mrpc::Value` (binary) back into a `MsgToContext`.
///
/// # Errors
/// Returns an error if the payload is not binary or cannot be decoded by
/// `rmp_serde`.
pub fn value_to_msg(value: Value) -> Result<MsgToContext, Error> {
    match value {
        Value::Binary(bytes) => {
            let msg: MsgToContext = rmp_serde::from_slice(&bytes)?;
            Ok(msg)
        }
        other => Err(Error::InvalidValueType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Settings;

    #[test]
    fn roundtrip_all_msg_variants() {
        let samples = vec![
            MsgToContext::SettingsUpdated {
                settings: Settings::default(),
            },
            MsgToContext::Heartbeat { ms: 123_456 },
        ];
        for msg in samples {
            let val = msg_to_value(&msg).expect("encode");
            let back = value_to_msg(val).expect("decode");
            assert_eq!(msg, back);
        }
    }

    #[test]
    fn rejects_non_binary_values() {
        let err = value_to_msg(Value::String("nope".into())).expect_err("type error");
        assert!(matches!(err, Error::InvalidValueType(_)));
    }

    #[test]
    fn wire_tag_is_the_settings_updated_marker() {
        // The internally tagged form must carry the canonical "type" marker
        // so non-Rust contexts can dispatch on it.
        let val = msg_to_value(&MsgToContext::SettingsUpdated {
            settings: Settings::default(),
        })
        .expect("encode");
        let Value::Binary(bytes) = val else {
            panic!("binary payload expected");
        };
        let as_json: serde_json::Value = rmp_serde::from_slice(&bytes).expect("decode");
        assert_eq!(as_json["type"], "SETTINGS_UPDATED");
        assert_eq!(as_json["settings"]["send"], "enter");
        assert_eq!(as_json["settings"]["newline"], "shift+enter");
    }
}
