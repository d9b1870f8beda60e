//! Message body codec.
//!
//! A body on the wire is a sequence of NUL-terminated parts.

/// Encodes body parts, terminating each with a NUL byte.
#[must_use]
pub fn encode_body<S: AsRef<str>>(parts: &[S]) -> Vec<u8> {
    let capacity = parts.iter().map(|part| part.as_ref().len() + 1).sum();
    let mut payload = Vec::with_capacity(capacity);
    for part in parts {
        payload.extend_from_slice(part.as_ref().as_bytes());
        payload.push(0);
    }
    payload
}

/// Splits a payload into its body parts.
///
/// A missing final terminator is treated as present, so an empty payload
/// yields a single empty part. Invalid UTF-8 is replaced rather than
/// rejected.
#[must_use]
pub fn decode_body(payload: &[u8]) -> Vec<String> {
    payload
        .strip_suffix(b"\0")
        .unwrap_or(payload)
        .split(|byte| *byte == 0)
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect()
}
