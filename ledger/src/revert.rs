//! Decoding of failure diagnostics embedded in confirmations.
//!
//! Ethereum-style ledgers report why a call reverted as ABI-encoded data:
//! either `Error(string)` or `Panic(uint256)`.

/// Selector of `Error(string)`.
const ERROR_SELECTOR: &str = "0x08c379a0";

/// Selector of `Panic(uint256)`.
const PANIC_SELECTOR: &str = "0x4e487b71";

const WORD: usize = 32;

/// Decode an encoded failure reason into readable text.
///
/// Returns `None` when `raw` is not a recognised encoding, so callers keep the
/// original text.
pub fn decode_failure_reason(raw: &str) -> Option<String> {
    if let Some(body) = strip_selector(raw, ERROR_SELECTOR) {
        return decode_error_string(&hex::decode(body).ok()?);
    }
    if let Some(body) = strip_selector(raw, PANIC_SELECTOR) {
        return decode_panic(&hex::decode(body).ok()?);
    }
    None
}

fn strip_selector<'a>(raw: &'a str, selector: &str) -> Option<&'a str> {
    let head = raw.get(..selector.len())?;
    if head.eq_ignore_ascii_case(selector) {
        raw.get(selector.len()..)
    } else {
        None
    }
}

fn decode_error_string(data: &[u8]) -> Option<String> {
    let offset = word_as_usize(data.get(..WORD)?)?;
    let len_end = offset.checked_add(WORD)?;
    let len = word_as_usize(data.get(offset..len_end)?)?;
    let text = data.get(len_end..len_end.checked_add(len)?)?;
    String::from_utf8(text.to_vec()).ok()
}

fn decode_panic(data: &[u8]) -> Option<String> {
    let word = data.get(..WORD)?;
    let code = match word_as_usize(word) {
        Some(code) if code <= u32::MAX as usize => code,
        _ => return Some(format!("PANIC: 0x{}", trimmed_hex(word))),
    };
    let text = match code {
        0x01 => "PANIC: Explicit assert invoked (0x01)".to_string(),
        0x11 => "PANIC: arithmetic overflow or underflow (0x11)".to_string(),
        0x12 => "PANIC: division by zero (or modulo zero) (0x12)".to_string(),
        0x22 => "PANIC: access attempted of incorrect encoded storage byte array (0x22)".to_string(),
        0x31 => "PANIC: '.pop()' called on an empty array (0x31)".to_string(),
        0x32 => "PANIC: array index out of bounds. (0x32)".to_string(),
        0x41 => "PANIC: Too much memory allocated, or array too large (0x41)".to_string(),
        0x51 => {
            "PANIC: called an zero-initialized variable of internal function type (0x51)".to_string()
        }
        other => format!("PANIC: 0x{other:x}"),
    };
    Some(text)
}

/// Interpret a 32-byte big-endian word as `usize`, `None` if it does not fit.
fn word_as_usize(word: &[u8]) -> Option<usize> {
    const SIZE: usize = std::mem::size_of::<usize>();
    let (high, low) = word.split_at(word.len().checked_sub(SIZE)?);
    if high.iter().any(|b| *b != 0) {
        return None;
    }
    Some(usize::from_be_bytes(low.try_into().ok()?))
}

fn trimmed_hex(word: &[u8]) -> String {
    let text = hex::encode(word);
    let trimmed = text.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
