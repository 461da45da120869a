//! Command argument and response framing (spec.md §3 "Chain op").

use bytes::Bytes;

/// An ordered sequence of byte-strings — the argument list a command
/// receives, and the response body it produces. The first element of a
/// response is conventionally a status token (spec.md §4.1).
pub type ArgList = Vec<Bytes>;

/// Wraps a byte slice as a command argument without an extra allocation
/// when the caller already owns `Bytes`.
pub fn arg(bytes: impl Into<Bytes>) -> Bytes {
    bytes.into()
}

/// Response sentinel prefixes (spec.md §6 "Response sentinels").
pub mod sentinel {
    pub const OK: &str = "!ok";
    pub const KEY_NOT_FOUND: &str = "!key_not_found";
    pub const DUPLICATE_KEY: &str = "!duplicate_key";
    pub const FULL: &str = "!full";
    pub const EMPTY: &str = "!empty";
    pub const BLOCK_MOVED: &str = "!block_moved";
    pub const REDO: &str = "!redo";
    pub const EXPORTING: &str = "!exporting";
    pub const WRONG_STATE: &str = "!wrong_state";
}

/// Builds a single-token response.
pub fn status(token: &str) -> ArgList {
    vec![Bytes::copy_from_slice(token.as_bytes())]
}

/// Builds a two-token response (status + payload), e.g. `!block_moved <target>`.
pub fn status_with(token: &str, payload: impl Into<Bytes>) -> ArgList {
    vec![Bytes::copy_from_slice(token.as_bytes()), payload.into()]
}
