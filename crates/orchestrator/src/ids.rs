//! Identifier generation: a fixed prefix plus 32 hex characters (128 bits of entropy) drawn from
//! the process RNG.

use rand::RngCore;

fn random_hex32() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);

    let mut out = String::with_capacity(32);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Generates a new response id: `resp_` + 32 hex.
pub fn response_id() -> String {
    format!("resp_{}", random_hex32())
}

/// Generates a new message output item id: `msg_` + 32 hex.
pub fn message_id() -> String {
    format!("msg_{}", random_hex32())
}

/// Generates a new function-call output item id: `fc_` + 32 hex.
pub fn function_call_id() -> String {
    format!("fc_{}", random_hex32())
}

/// Generates a new reasoning output item id: `rs_` + 32 hex.
pub fn reasoning_id() -> String {
    format!("rs_{}", random_hex32())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_have_expected_shape() {
        assert!(response_id().starts_with("resp_"));
        assert_eq!(response_id().len(), "resp_".len() + 32);
        assert!(message_id().starts_with("msg_"));
        assert!(function_call_id().starts_with("fc_"));
        assert!(reasoning_id().starts_with("rs_"));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(response_id(), response_id());
    }
}
