// src/protocol/fastpath.rs
//! Zero-copy fast path for `mining.submit` requests
//!
//! `mining.submit` outnumbers every other Stratum method combined by orders
//! of magnitude, and a full `serde_json` decode of each line would dominate
//! CPU under load. This module pulls the JSON-RPC `id` token out of a raw
//! request line with a single forward scan and no allocation, so the read
//! loop can acknowledge a submission before a worker has looked at it.
//!
//! A negative result here is never an error: the caller simply falls back to
//! a full decode. False negatives over the key match are acceptable; a
//! wrongly-terminated scan is not.

/// Classification of a top-level object key during the scan.
#[derive(Clone, Copy, PartialEq, Eq)]
enum TopLevelKey {
    Other,
    Id,
    Method,
}

const SUBMIT_METHOD: &[u8] = b"mining.submit";

/// Attempts to extract the JSON-RPC `id` token from a `mining.submit`
/// request without fully decoding the message.
///
/// Returns `None` if the message is not a `mining.submit`, if no `id` was
/// found, or if the line is malformed enough that the scan cannot proceed
/// safely (the caller must then fall back to a full decode).
///
/// The returned slice aliases `line` and contains the raw JSON token for
/// the id (e.g. `1`, `"abc"`, `null`), so it can be embedded directly into
/// a JSON response. The caller must keep the request buffer alive, and
/// unmodified, for as long as the token is used; this is the zero-copy
/// contract that keeps the hot path allocation-free.
///
/// Only keys of the outermost object are interpreted. Nested structures are
/// skipped by consuming their whole value token. The scan returns as soon as
/// both `id` and `method` have been seen, which avoids touching `params`,
/// typically the largest field in the request.
pub fn fast_mining_submit_id(line: &[u8]) -> Option<&[u8]> {
    // Quick filter to avoid the structural scan for most non-submit traffic.
    if !contains(line, SUBMIT_METHOD) {
        return None;
    }

    let mut depth = 0usize;
    let mut in_str = false;
    let mut esc = false;

    let mut id_raw: Option<&[u8]> = None;
    let mut method_ok: Option<bool> = None;

    let mut i = 0usize;
    while i < line.len() {
        let c = line[i];

        if in_str {
            if esc {
                esc = false;
            } else if c == b'\\' {
                esc = true;
            } else if c == b'"' {
                in_str = false;
            }
            i += 1;
            continue;
        }

        match c {
            b'"' => {
                if depth == 1 {
                    // A string at depth 1 outside any value token is a key.
                    let (key, after_key) = scan_top_level_key(line, i)?;
                    let mut j = skip_spaces(line, after_key);
                    if j >= line.len() || line[j] != b':' {
                        return None;
                    }
                    j = skip_spaces(line, j + 1);

                    let (token, after_value) = scan_value_token(line, j)?;
                    match key {
                        TopLevelKey::Method => {
                            // "mining.submit" is ASCII; compare without unescaping.
                            if token.len() < 2 || token[0] != b'"' || token[token.len() - 1] != b'"'
                            {
                                return None;
                            }
                            method_ok = Some(&token[1..token.len() - 1] == SUBMIT_METHOD);
                        }
                        TopLevelKey::Id => id_raw = Some(token),
                        TopLevelKey::Other => {}
                    }

                    if let (Some(id), Some(ok)) = (id_raw, method_ok) {
                        return if ok { Some(id) } else { None };
                    }
                    i = after_value;
                    continue;
                }
                in_str = true;
                i += 1;
            }
            b'{' | b'[' => {
                depth += 1;
                i += 1;
            }
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            _ => i += 1,
        }
    }

    None
}

/// Naive substring search; request lines are short and the needle is fixed.
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Scans a top-level object key starting at the opening quote at `i`.
///
/// Returns the classified key and the index one past the closing quote.
/// Keys containing escape sequences are classified as [`TopLevelKey::Other`]
/// (the keys we match are plain ASCII) but the key string is still fully
/// consumed so the scan continues from a valid position.
fn scan_top_level_key(b: &[u8], i: usize) -> Option<(TopLevelKey, usize)> {
    let end = scan_string_end(b, i)?;
    let body = &b[i + 1..end - 1];

    let key = if body.contains(&b'\\') {
        TopLevelKey::Other
    } else if body == b"id" {
        TopLevelKey::Id
    } else if body == b"method" {
        TopLevelKey::Method
    } else {
        TopLevelKey::Other
    };
    Some((key, end))
}

fn skip_spaces(b: &[u8], mut i: usize) -> usize {
    while i < b.len() && matches!(b[i], b' ' | b'\t' | b'\r' | b'\n') {
        i += 1;
    }
    i
}

/// Returns the raw slice for the next JSON value token starting at `i`, and
/// the index immediately after the token.
///
/// String tokens include their quotes; compound tokens include their matching
/// delimiter; scalar tokens (numbers, `null`, `true`, `false`) run until the
/// next structural character or whitespace.
fn scan_value_token(b: &[u8], i: usize) -> Option<(&[u8], usize)> {
    match *b.get(i)? {
        b'"' => {
            let end = scan_string_end(b, i)?;
            Some((&b[i..end], end))
        }
        b'{' | b'[' => {
            let end = scan_compound_end(b, i)?;
            Some((&b[i..end], end))
        }
        _ => {
            let mut j = i;
            while j < b.len() {
                match b[j] {
                    b',' | b'}' | b']' | b' ' | b'\t' | b'\r' | b'\n' => break,
                    _ => j += 1,
                }
            }
            if j == i {
                return None;
            }
            Some((&b[i..j], j))
        }
    }
}

/// Finds the end of a string literal whose opening quote is at `i`.
///
/// Returns the index one past the closing quote, or `None` if the string is
/// unterminated.
fn scan_string_end(b: &[u8], i: usize) -> Option<usize> {
    let mut esc = false;
    let mut j = i + 1;
    while j < b.len() {
        let c = b[j];
        if esc {
            esc = false;
        } else if c == b'\\' {
            esc = true;
        } else if c == b'"' {
            return Some(j + 1);
        }
        j += 1;
    }
    None
}

/// Finds the end of an object or array whose opening delimiter is at `i` by
/// counting nesting depth, with string-literal awareness.
///
/// Returns the index one past the matching closing delimiter, or `None` if
/// the compound is unterminated.
fn scan_compound_end(b: &[u8], i: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_str = false;
    let mut esc = false;

    let mut j = i;
    while j < b.len() {
        let c = b[j];
        if in_str {
            if esc {
                esc = false;
            } else if c == b'\\' {
                esc = true;
            } else if c == b'"' {
                in_str = false;
            }
            j += 1;
            continue;
        }
        match c {
            b'"' => in_str = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(j + 1);
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn extract(line: &str) -> Option<&[u8]> {
        fast_mining_submit_id(line.as_bytes())
    }

    /// The extracted token must equal the raw serialization of the id the
    /// generic decoder sees, across representative request shapes.
    #[test]
    fn test_id_matches_full_decode() {
        let lines = [
            r#"{"id":1,"method":"mining.submit","params":["w","j","00000000","6553f100","00000001"]}"#,
            r#"{"method":"mining.submit","params":["w","j","00000000","6553f100","00000001"],"id":42}"#,
            r#"{"id":"abc","method":"mining.submit","params":[]}"#,
            r#"{"id":null,"method":"mining.submit","params":[]}"#,
            r#"{"id":-7,"method":"mining.submit","params":[]}"#,
            "{ \"method\" : \"mining.submit\" , \"id\" : 7 , \"params\" : [] }",
        ];

        for line in lines {
            let token = extract(line).expect(line);
            let decoded: Value = serde_json::from_str(line).expect(line);
            let want = serde_json::to_string(&decoded["id"]).expect(line);
            assert_eq!(
                std::str::from_utf8(token).unwrap(),
                want,
                "fast path disagrees with full decode for {}",
                line
            );
        }
    }

    /// Numeric ids placed before and after the method key.
    #[test]
    fn test_numeric_id_positions() {
        assert_eq!(
            extract(r#"{"id":1,"method":"mining.submit","params":[]}"#),
            Some(b"1".as_slice())
        );
        assert_eq!(
            extract(r#"{"method":"mining.submit","params":[],"id":42}"#),
            Some(b"42".as_slice())
        );
    }

    /// String ids keep their quotes so they can be echoed verbatim.
    #[test]
    fn test_string_id_keeps_quotes() {
        assert_eq!(
            extract(r#"{"id":"abc","method":"mining.submit","params":[]}"#),
            Some(b"\"abc\"".as_slice())
        );
    }

    /// `null` is a valid id token and must be preserved as-is.
    #[test]
    fn test_null_id() {
        assert_eq!(
            extract(r#"{"id":null,"method":"mining.submit","params":[]}"#),
            Some(b"null".as_slice())
        );
    }

    /// Whitespace between every structural element must not confuse the scan.
    #[test]
    fn test_whitespace_tolerated() {
        assert_eq!(
            extract("{ \"method\" : \"mining.submit\" , \"id\" : 7 , \"params\" : [] }"),
            Some(b"7".as_slice())
        );
    }

    /// Non-submit methods are negative even when the payload happens to
    /// mention mining.submit somewhere (e.g. inside params).
    #[test]
    fn test_non_submit_is_negative() {
        assert_eq!(extract(r#"{"id":1,"method":"mining.ping","params":[]}"#), None);
        assert_eq!(
            extract(r#"{"id":1,"method":"mining.authorize","params":["mining.submit"]}"#),
            None
        );
    }

    /// `params` placed before `id` must be skipped as one compound token,
    /// including nested structures and strings containing braces.
    #[test]
    fn test_params_skipped_as_compound() {
        let line = r#"{"method":"mining.submit","params":["w{]","j",{"deep":[1,2,{"x":"}"}]}],"id":9}"#;
        assert_eq!(extract(line), Some(b"9".as_slice()));
    }

    /// Keys containing escape sequences are non-matches but the scan keeps
    /// going and still finds the real keys afterwards.
    #[test]
    fn test_escaped_key_does_not_abort() {
        let line = r#"{"we\\u0069rd":0,"id":3,"method":"mining.submit","params":[]}"#;
        assert_eq!(extract(line), Some(b"3".as_slice()));
    }

    /// A nested object with its own "id" key must not shadow the top-level id.
    #[test]
    fn test_nested_id_ignored() {
        let line = r#"{"extra":{"id":99},"id":5,"method":"mining.submit","params":[]}"#;
        assert_eq!(extract(line), Some(b"5".as_slice()));
    }

    /// Malformed input aborts with a negative result so the caller falls
    /// back to a full decode.
    #[test]
    fn test_malformed_is_negative() {
        // Unterminated string value.
        assert_eq!(extract(r#"{"id":1,"method":"mining.submit"#), None);
        // Unterminated params array.
        assert_eq!(extract(r#"{"method":"mining.submit","params":[1,2"#), None);
        // Non-string method value.
        assert_eq!(extract(r#"{"id":1,"method":42,"params":["mining.submit"]}"#), None);
        // Missing colon after a key.
        assert_eq!(extract(r#"{"id" 1,"method":"mining.submit"}"#), None);
    }

    /// A submit line with no id at all is negative; there is nothing to echo.
    #[test]
    fn test_missing_id_is_negative() {
        assert_eq!(extract(r#"{"method":"mining.submit","params":[]}"#), None);
    }
}
