//! Short secret codes attached to every order

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const CONFIRMATION_CODE_LEN: usize = 6;
pub const PICKUP_CODE_LEN: usize = 5;

fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Buyer-facing code, checked when the order is handed over.
pub fn confirmation_code() -> String {
    random_code(CONFIRMATION_CODE_LEN)
}

/// Courier-facing code, checked by the seller at the store.
pub fn pickup_code() -> String {
    random_code(PICKUP_CODE_LEN)
}
