//! Random mailbox alias prefixes.
//!
//! A prefix is 16 characters: an uppercase letter, 14 random alphanumerics
//! (mixed case and digits), and a closing uppercase letter.

use rand::Rng;

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Total length of a generated prefix.
pub const PREFIX_LEN: usize = 16;

/// Generate a random alias prefix.
pub fn generate_prefix() -> String {
    let mut rng = rand::thread_rng();
    let mut prefix = String::with_capacity(PREFIX_LEN);

    prefix.push(UPPER[rng.gen_range(0..UPPER.len())] as char);
    for _ in 0..PREFIX_LEN - 2 {
        prefix.push(ALNUM[rng.gen_range(0..ALNUM.len())] as char);
    }
    prefix.push(UPPER[rng.gen_range(0..UPPER.len())] as char);

    prefix
}

/// Form the full mailbox address for a prefix.
pub fn full_address(prefix: &str, domain: &str) -> String {
    format!("{prefix}@{domain}")
}
