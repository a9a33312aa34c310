use crate::bson::Bson;

/// Coerce numeric types into an `i64` if it would be lossless to do so. If this Bson is not numeric
/// or the conversion would be lossy (e.g. 1.5 -> 1), this returns `None`.
pub(crate) fn get_int(val: &Bson) -> Option<i64> {
    match *val {
        Bson::Int32(i) => Some(i64::from(i)),
        Bson::Int64(i) => Some(i),
        Bson::Double(f) if (f - (f as i64 as f64)).abs() <= f64::EPSILON => Some(f as i64),
        _ => None,
    }
}

/// Interprets a reply's `ok` field, which servers send either as a boolean or as a number.
pub(crate) fn is_ok(val: Option<&Bson>) -> bool {
    match val {
        Some(Bson::Boolean(ok)) => *ok,
        Some(other) => get_int(other) == Some(1),
        None => false,
    }
}

/// Reads the little-endian i32 at the start of `bytes`, if there are enough of them.
pub(crate) fn read_i32_le(bytes: &[u8]) -> Option<i32> {
    let prefix: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(i32::from_le_bytes(prefix))
}
