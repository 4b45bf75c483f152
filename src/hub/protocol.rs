//! Minimal SignalR-style hub wire framing: inbound server-to-client
//! invocations carry `{"M": [{"H", "M", "A"}]}` envelopes, and outbound
//! client-to-server invocations are `{"H", "M", "A", "I"}` with a matching
//! `{"I", "R"|"E"}` result frame. The core only needs enough of this to
//! dispatch by method name and correlate invoke results — no other hub-level
//! semantics (negotiate, groups, state) are modeled.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One server-initiated invocation carried inside an inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundInvocation {
    pub method: String,
    /// The raw "A" argument as a string — this is what the Wire Decoder
    /// (`crate::codec::decode`) is applied to.
    pub payload: String,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "M", default)]
    messages: Vec<RawInvocation>,
}

#[derive(Debug, Deserialize)]
struct RawInvocation {
    #[serde(rename = "M")]
    method: String,
    #[serde(rename = "A", default)]
    args: Vec<Value>,
}

/// Parses an inbound frame into its carried invocations. Frames that are not
/// envelopes of server invocations (e.g. invoke-result frames) yield an
/// empty vector; callers should try [`parse_invocation_result`] first.
pub fn parse_inbound(text: &str) -> Vec<InboundInvocation> {
    let Ok(envelope) = serde_json::from_str::<RawEnvelope>(text) else {
        return Vec::new();
    };

    envelope
        .messages
        .into_iter()
        .filter_map(|invocation| {
            let payload = invocation.args.first()?;
            let payload = match payload {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(InboundInvocation { method: invocation.method, payload })
        })
        .collect()
}

/// A client-to-server method invocation.
#[derive(Debug, Serialize)]
pub struct OutboundInvocation<'a> {
    #[serde(rename = "H")]
    pub hub: &'a str,
    #[serde(rename = "M")]
    pub method: &'a str,
    #[serde(rename = "A")]
    pub args: &'a [Value],
    #[serde(rename = "I")]
    pub id: u64,
}

impl<'a> OutboundInvocation<'a> {
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).expect("OutboundInvocation is always serializable")
    }
}

/// The server's reply to an [`OutboundInvocation`], correlated by `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct InvocationResult {
    #[serde(rename = "I")]
    pub id: Value,
    #[serde(rename = "R", default)]
    pub result: Option<Value>,
    #[serde(rename = "E", default)]
    pub error: Option<String>,
}

impl InvocationResult {
    /// Compares the echoed id against the numeric id an [`OutboundInvocation`]
    /// was sent with, tolerating either a JSON number or string encoding.
    pub fn matches_id(&self, id: u64) -> bool {
        match &self.id {
            Value::Number(n) => n.as_u64() == Some(id),
            Value::String(s) => s.parse::<u64>().map(|parsed| parsed == id).unwrap_or(false),
            _ => false,
        }
    }
}

/// Attempts to parse `text` as an invoke-result frame. Returns `None` for any
/// other frame shape (e.g. an inbound invocation envelope).
pub fn parse_invocation_result(text: &str) -> Option<InvocationResult> {
    let value: Value = serde_json::from_str(text).ok()?;
    if value.get("I").is_none() || value.get("M").is_some() {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// An invocation is considered successful if it errored out with neither a
/// server-side error nor an explicit `false` return value.
pub fn invocation_succeeded(result: &InvocationResult) -> bool {
    result.error.is_none() && !matches!(result.result, Some(Value::Bool(false)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_single_invocation_with_a_compressed_payload_argument() {
        let frame = json!({"M": [{"H": "coreHub", "M": "marketDeltas", "A": ["eJwritten"]}]}).to_string();
        let invocations = parse_inbound(&frame);
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].method, "marketDeltas");
        assert_eq!(invocations[0].payload, "eJwritten");
    }

    #[test]
    fn parses_multiple_invocations_in_one_envelope() {
        let frame = json!({"M": [
            {"H": "coreHub", "M": "a", "A": ["one"]},
            {"H": "coreHub", "M": "b", "A": ["two"]},
        ]})
        .to_string();
        let invocations = parse_inbound(&frame);
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[1].method, "b");
    }

    #[test]
    fn invocation_result_with_false_return_value_is_not_success() {
        let frame = json!({"I": "7", "R": false}).to_string();
        let result = parse_invocation_result(&frame).unwrap();
        assert!(!invocation_succeeded(&result));
    }

    #[test]
    fn invocation_result_with_true_return_value_is_success() {
        let frame = json!({"I": "7", "R": true}).to_string();
        let result = parse_invocation_result(&frame).unwrap();
        assert!(invocation_succeeded(&result));
    }

    #[test]
    fn envelope_frame_is_not_mistaken_for_an_invocation_result() {
        let frame = json!({"M": [{"H": "coreHub", "M": "a", "A": ["one"]}]}).to_string();
        assert!(parse_invocation_result(&frame).is_none());
    }

    #[test]
    fn outbound_invocation_serializes_with_short_field_names() {
        let args = vec![json!("BTCUSDT")];
        let invocation = OutboundInvocation { hub: "coreHub", method: "SubscribeToExchangeDeltas", args: &args, id: 3 };
        let wire = invocation.to_wire();
        assert!(wire.contains("\"H\":\"coreHub\""));
        assert!(wire.contains("\"I\":3"));
    }
}
