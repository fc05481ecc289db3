//! Identifier generation.

use rand::RngCore;

/// 16 random bytes, lowercase hex. Used for account and entry ids.
pub fn rand_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Id for a transaction intent event.
pub fn event_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rand_id_is_32_hex_chars() {
        let id = rand_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn ids_do_not_repeat() {
        assert_ne!(rand_id(), rand_id());
        assert_ne!(event_id(), event_id());
    }
}
