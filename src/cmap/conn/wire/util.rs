use std::sync::atomic::{AtomicI32, Ordering};

use crate::error::{Error, Result};

static REQUEST_ID: AtomicI32 = AtomicI32::new(0);

/// Obtain a new, unique request ID.
pub(crate) fn next_request_id() -> i32 {
    REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// Appends `string`'s UTF-8 bytes to `buf` with a null terminator.
pub(super) fn write_cstring(buf: &mut Vec<u8>, string: &str) -> Result<()> {
    if string.as_bytes().contains(&0) {
        return Err(Error::encoding(format!(
            "{:?} cannot be encoded as a C string because it contains a null byte",
            string
        )));
    }
    buf.extend_from_slice(string.as_bytes());
    buf.push(0);
    Ok(())
}
