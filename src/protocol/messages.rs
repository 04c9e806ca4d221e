// src/protocol/messages.rs
//! Stratum v1 wire message types
//!
//! Newline-delimited JSON-RPC over a persistent stream. The request envelope
//! is decoded generically; `mining.submit` parameters are positional and are
//! pulled out of the params array by [`SubmitParams::parse`]. Responses are
//! rendered straight to strings since the server only ever writes two shapes:
//! success and rejection.

use crate::submit::reject::RejectReason;
use crate::utils::error::PoolError;
use serde::Deserialize;
use serde_json::{Value, json};

/// Method name of the dominant hot-path request.
pub const METHOD_SUBMIT: &str = "mining.submit";

/// Generic JSON-RPC request envelope
///
/// Decoded on the fallback path, and by the submission processor to recover
/// the positional params. `id` may be any JSON value per the protocol.
#[derive(Debug, Deserialize)]
pub struct StratumRequest {
    /// Request id, echoed verbatim in the response
    #[serde(default)]
    pub id: Value,
    /// Method name (e.g. "mining.submit")
    pub method: String,
    /// Positional parameters
    #[serde(default)]
    pub params: Value,
}

/// Positional parameters of a `mining.submit` request
///
/// Wire order: `[worker, jobId, extranonce2Hex, timeHex, nonceHex, versionHex?]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitParams {
    /// Worker name as authorized by the pool
    pub worker: String,
    /// Job identifier the share was mined against
    pub job_id: String,
    /// Miner-chosen extranonce2, hex encoded
    pub extranonce2: String,
    /// Header timestamp, 8 hex chars
    pub ntime: String,
    /// Header nonce, 8 hex chars
    pub nonce: String,
    /// Optional rolled version bits, 8 hex chars
    pub version_bits: Option<String>,
}

impl SubmitParams {
    /// Extracts submit parameters from a decoded params value.
    ///
    /// # Errors
    /// Returns `PoolError::ProtocolError` if params is not an array of at
    /// least five strings.
    pub fn parse(params: &Value) -> Result<Self, PoolError> {
        let arr = params
            .as_array()
            .ok_or_else(|| PoolError::ProtocolError("params is not an array".to_string()))?;

        let field = |idx: usize, name: &str| -> Result<String, PoolError> {
            arr.get(idx)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| PoolError::ProtocolError(format!("missing param {}", name)))
        };

        Ok(SubmitParams {
            worker: field(0, "worker")?,
            job_id: field(1, "job_id")?,
            extranonce2: field(2, "extranonce2")?,
            ntime: field(3, "ntime")?,
            nonce: field(4, "nonce")?,
            version_bits: arr.get(5).and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// Renders a success response line (no trailing newline).
pub fn success_response(id: &Value) -> String {
    json!({"id": id, "result": true, "error": null}).to_string()
}

/// Renders a rejection response line for the given reason (no trailing newline).
pub fn error_response(id: &Value, reason: RejectReason) -> String {
    json!({"id": id, "result": null, "error": [reason.code(), reason.message(), null]}).to_string()
}

/// Renders the error response for a method the server does not handle.
///
/// The submission engine only speaks `mining.submit`; handshake and control
/// methods belong to the surrounding server process.
pub fn unsupported_method_response(id: &Value) -> String {
    json!({"id": id, "result": null, "error": [20, "Method not supported", null]}).to_string()
}

/// Renders a success response embedding a raw, fast-path-extracted id token.
///
/// The token comes straight from [`crate::protocol::fast_mining_submit_id`]
/// and is spliced in without re-encoding; this is what makes the optimistic
/// acknowledgement allocation-light.
pub fn raw_success_response(id_raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(id_raw.len() + 34);
    out.extend_from_slice(b"{\"id\":");
    out.extend_from_slice(id_raw);
    out.extend_from_slice(b",\"result\":true,\"error\":null}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Positional params with and without the optional version field.
    #[test]
    fn test_parse_submit_params() {
        let v: Value =
            serde_json::from_str(r#"["w1","job1","aabbccdd","6553f100","00000001"]"#).unwrap();
        let p = SubmitParams::parse(&v).unwrap();
        assert_eq!(p.worker, "w1");
        assert_eq!(p.job_id, "job1");
        assert_eq!(p.extranonce2, "aabbccdd");
        assert_eq!(p.ntime, "6553f100");
        assert_eq!(p.nonce, "00000001");
        assert_eq!(p.version_bits, None);

        let v: Value =
            serde_json::from_str(r#"["w1","job1","aabbccdd","6553f100","00000001","20000000"]"#)
                .unwrap();
        let p = SubmitParams::parse(&v).unwrap();
        assert_eq!(p.version_bits.as_deref(), Some("20000000"));
    }

    /// Short arrays and non-string entries are protocol errors.
    #[test]
    fn test_parse_submit_params_malformed() {
        let v: Value = serde_json::from_str(r#"["w1","job1"]"#).unwrap();
        assert!(SubmitParams::parse(&v).is_err());

        let v: Value = serde_json::from_str(r#"["w1","job1",7,"6553f100","00000001"]"#).unwrap();
        assert!(SubmitParams::parse(&v).is_err());

        let v: Value = serde_json::from_str(r#"{"worker":"w1"}"#).unwrap();
        assert!(SubmitParams::parse(&v).is_err());
    }

    /// The raw-id response must splice the token verbatim, quotes and all.
    #[test]
    fn test_raw_success_response() {
        assert_eq!(
            raw_success_response(b"1"),
            b"{\"id\":1,\"result\":true,\"error\":null}".to_vec()
        );
        assert_eq!(
            raw_success_response(b"\"abc\""),
            b"{\"id\":\"abc\",\"result\":true,\"error\":null}".to_vec()
        );
    }
}
