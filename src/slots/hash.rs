//! Slot-name hashing (spec §4.2).
//!
//! Hashed names always land in the reserved range `(0x0fffffff, 0xffffffff]`;
//! a caller-supplied numeric slot in `[0, 0x0fffffff]` is used as-is, so the
//! two namespaces never collide.

use crate::core::error::{Error, ErrorKind};
use serde_json::Value;

/// Maximum value a numeric slot may take before it collides with the
/// reserved, hashed-name range.
pub const MAX_NUMERIC_SLOT: u32 = 0x0fff_ffff;
const RESERVED_BASE: u32 = 0x1000_0000;

/// Sentinel meaning "no slot is assigned" (the empty-string case).
pub const NO_SLOT: u32 = u32::MAX;

/// Hash a slot name into the reserved range. The empty string maps to
/// [`NO_SLOT`].
pub fn hash_slot(name: &str) -> u32 {
    if name.is_empty() {
        return NO_SLOT;
    }
    let mut h: u32 = 1;
    for b in name.bytes() {
        h = h.wrapping_add(h.wrapping_shl(5)).wrapping_add(b as u32);
    }
    RESERVED_BASE.wrapping_add(h & MAX_NUMERIC_SLOT)
}

/// Resolve a JSON slot-name specification to a raw slot number, following
/// the same rules as the original's `SlotName::to_json` round-trip: `null`
/// means no slot, a non-negative integer is used directly, and a string is
/// hashed.
pub fn slot_from_json(value: &Value) -> crate::core::error::Result<u32> {
    match value {
        Value::Null => Ok(NO_SLOT),
        Value::String(s) => Ok(hash_slot(s)),
        Value::Number(n) => {
            let i = n.as_i64().ok_or_else(|| {
                Error::new(ErrorKind::InvalidValue, "slot number must be a non-negative integer")
            })?;
            if i < 0 || i as u64 > MAX_NUMERIC_SLOT as u64 {
                return Err(Error::new(
                    ErrorKind::InvalidValue,
                    format!("slot number {i} out of range [0, {MAX_NUMERIC_SLOT}]"),
                ));
            }
            Ok(i as u32)
        }
        _ => Err(Error::new(ErrorKind::InvalidValue, "slot specification must be null, a string or a number")),
    }
}
