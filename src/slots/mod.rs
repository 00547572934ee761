pub mod codec;
pub mod hash;

pub use codec::{SlotDecoder, ValueEncoding};
pub use hash::{hash_slot, slot_from_json, NO_SLOT};
