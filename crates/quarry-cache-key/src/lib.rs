pub use digest::{canonical_json, checksum, digest, digest_value};
pub use sanitize::sanitize;

mod digest;
mod sanitize;
