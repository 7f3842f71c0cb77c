//! Card record authentication

use hmac::{Hmac, Mac};
use sha2::Sha256;
use simplebank_types::Card;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the immutable fields of a card row
///
/// Fields are fed in a fixed order, each followed by a `|` separator, so that
/// no two distinct records produce the same input.
pub struct CardMac {
    key: Zeroizing<Vec<u8>>,
}

impl CardMac {
    pub fn new(key: &[u8]) -> Self {
        Self {
            key: Zeroizing::new(key.to_vec()),
        }
    }

    fn mac_for(&self, card: &Card) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        for field in [
            card.id.to_string(),
            card.account_id.to_string(),
            card.pan_encrypted.clone(),
            card.expiry_month.to_string(),
            card.expiry_year.to_string(),
        ] {
            mac.update(field.as_bytes());
            mac.update(b"|");
        }
        mac
    }

    /// Compute the hex-encoded tag for a card
    pub fn sign(&self, card: &Card) -> String {
        hex::encode(self.mac_for(card).finalize().into_bytes())
    }

    /// Check the stored tag in constant time
    pub fn verify(&self, card: &Card) -> bool {
        let Ok(expected) = hex::decode(&card.hmac) else {
            return false;
        };
        self.mac_for(card).verify_slice(&expected).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn card() -> Card {
        Card {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            pan_encrypted: "Y2lwaGVydGV4dA==".to_string(),
            cvv_hash: "$argon2id$...".to_string(),
            expiry_month: 6,
            expiry_year: 2030,
            hmac: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let mac = CardMac::new(b"card-hmac-key");
        let mut card = card();
        card.hmac = mac.sign(&card);

        assert_eq!(card.hmac.len(), 64);
        assert!(mac.verify(&card));
    }

    #[test]
    fn test_single_bit_flip_in_tag_fails() {
        let mac = CardMac::new(b"card-hmac-key");
        let mut card = card();
        let mut tag = hex::decode(mac.sign(&card)).unwrap();
        tag[0] ^= 0x01;
        card.hmac = hex::encode(tag);

        assert!(!mac.verify(&card));
    }

    #[test]
    fn test_field_change_fails() {
        let mac = CardMac::new(b"card-hmac-key");
        let mut card = card();
        card.hmac = mac.sign(&card);

        let mut moved = card.clone();
        moved.account_id = Uuid::new_v4();
        assert!(!mac.verify(&moved));

        let mut extended = card.clone();
        extended.expiry_year += 1;
        assert!(!mac.verify(&extended));
    }

    #[test]
    fn test_cvv_hash_not_covered() {
        let mac = CardMac::new(b"card-hmac-key");
        let mut card = card();
        card.hmac = mac.sign(&card);
        card.cvv_hash = "other".to_string();
        assert!(mac.verify(&card));
    }

    #[test]
    fn test_wrong_key_or_garbage_tag_fails() {
        let mut card = card();
        card.hmac = CardMac::new(b"key-one").sign(&card);
        assert!(!CardMac::new(b"key-two").verify(&card));

        card.hmac = "zz-not-hex".to_string();
        assert!(!CardMac::new(b"key-one").verify(&card));
    }
}
