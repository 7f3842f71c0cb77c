//! Card issuance, listing and authorization
//!
//! The PAN is encrypted before it reaches the repository and the CVV is
//! kept only as an Argon2 hash. Every stored card carries an HMAC over its
//! immutable fields; a card whose tag does not verify is treated exactly
//! like a missing one.

use simplebank_auth::PasswordService;
use simplebank_crypto::{mask_pan, CardCipher, CardMac, FULLY_MASKED_PAN};
use simplebank_db::Repository;
use simplebank_types::{Card, Clock, IssuedCard, MaskedCard, Principal};
use std::sync::Arc;
use uuid::Uuid;

use super::load_owned_account;
use crate::error::{BankError, BankResult};
use crate::numbers::{card_expiry, generate_card_number, generate_cvv};

/// Shared by unknown, tampered and wrong-CVV cards
pub(crate) const INVALID_CARD: &str = "Invalid card or CVV";

pub struct CardService {
    repo: Arc<dyn Repository>,
    cipher: Arc<dyn CardCipher>,
    mac: Arc<CardMac>,
    passwords: Arc<PasswordService>,
    clock: Arc<dyn Clock>,
}

impl CardService {
    pub fn new(
        repo: Arc<dyn Repository>,
        cipher: Arc<dyn CardCipher>,
        mac: Arc<CardMac>,
        passwords: Arc<PasswordService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            cipher,
            mac,
            passwords,
            clock,
        }
    }

    /// Issue a card on one of the caller's accounts
    ///
    /// The returned [`IssuedCard`] is the only place the PAN and CVV are
    /// ever exposed in clear.
    pub async fn issue(&self, principal: &Principal, account_id: Uuid) -> BankResult<IssuedCard> {
        let account = load_owned_account(self.repo.as_ref(), principal, account_id).await?;

        let now = self.clock.now();
        let pan = generate_card_number();
        let cvv = generate_cvv();
        let (expiry_month, expiry_year) = card_expiry(now);

        let mut card = Card {
            id: Uuid::new_v4(),
            account_id: account.id,
            pan_encrypted: self.cipher.encrypt(&pan)?,
            cvv_hash: self.passwords.hash_password(&cvv)?,
            expiry_month,
            expiry_year,
            hmac: String::new(),
            created_at: now,
        };
        card.hmac = self.mac.sign(&card);

        self.repo.add_card(&card).await?;

        tracing::info!(
            user_id = %principal.user_id,
            account_id = %account.id,
            card_id = %card.id,
            "Card issued"
        );

        Ok(IssuedCard {
            card_id: card.id,
            account_id: card.account_id,
            card_number: pan,
            cvv,
            expiry_month,
            expiry_year,
            created_at: now,
        })
    }

    /// Masked cards of one of the caller's accounts; tampered rows are omitted
    pub async fn list(&self, principal: &Principal, account_id: Uuid) -> BankResult<Vec<MaskedCard>> {
        let account = load_owned_account(self.repo.as_ref(), principal, account_id).await?;
        let cards = self.repo.get_cards_by_account(account.id).await?;

        Ok(cards
            .into_iter()
            .filter(|card| self.authentic(card))
            .map(|card| MaskedCard {
                number_masked: self.masked_number(&card),
                id: card.id,
                account_id: card.account_id,
                expiry_month: card.expiry_month,
                expiry_year: card.expiry_year,
                created_at: card.created_at,
            })
            .collect())
    }

    /// Load a card and check its tag
    pub(crate) async fn verified_card(&self, card_id: Uuid) -> BankResult<Card> {
        let card = self
            .repo
            .get_card_by_id(card_id)
            .await?
            .ok_or_else(|| BankError::Unauthorized(INVALID_CARD.to_string()))?;

        if !self.authentic(&card) {
            return Err(BankError::Unauthorized(INVALID_CARD.to_string()));
        }
        Ok(card)
    }

    /// Check a presented CVV against the stored hash
    pub(crate) fn check_cvv(&self, card: &Card, cvv: &str) -> BankResult<()> {
        match self.passwords.verify_password(cvv, &card.cvv_hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(BankError::Unauthorized(INVALID_CARD.to_string())),
            Err(e) => {
                tracing::error!(card_id = %card.id, error = %e, "Stored CVV hash is unreadable");
                Err(BankError::Unauthorized(INVALID_CARD.to_string()))
            }
        }
    }

    fn authentic(&self, card: &Card) -> bool {
        let ok = self.mac.verify(card);
        if !ok {
            tracing::warn!(card_id = %card.id, "Card failed integrity check");
        }
        ok
    }

    fn masked_number(&self, card: &Card) -> String {
        match self.cipher.decrypt(&card.pan_encrypted) {
            Ok(pan) => mask_pan(&pan),
            Err(e) => {
                tracing::warn!(card_id = %card.id, error = %e, "Cannot decrypt card number");
                FULLY_MASKED_PAN.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numbers::validate_luhn;
    use crate::services::testing::harness;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_issue_and_list_masked() {
        let h = harness();
        let alice = h.user("alice").await;
        let account = h.funded_account(&alice, Decimal::ZERO).await;

        let issued = h.services.cards.issue(&alice, account.id).await.unwrap();
        assert_eq!(issued.card_number.len(), 16);
        assert!(validate_luhn(&issued.card_number));
        assert_eq!(issued.cvv.len(), 3);
        assert_eq!((issued.expiry_month, issued.expiry_year), (1, 2028));

        let stored = h.repo.get_card_by_id(issued.card_id).await.unwrap().unwrap();
        assert!(!stored.pan_encrypted.contains(&issued.card_number));
        assert_ne!(stored.cvv_hash, issued.cvv);

        let listed = h.services.cards.list(&alice, account.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(
            listed[0].number_masked,
            format!("**** **** **** {}", &issued.card_number[12..])
        );
    }

    #[tokio::test]
    async fn test_foreign_account_forbidden() {
        let h = harness();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let account = h.funded_account(&alice, Decimal::ZERO).await;

        assert!(matches!(
            h.services.cards.issue(&bob, account.id).await,
            Err(BankError::Forbidden(_))
        ));
        assert!(matches!(
            h.services.cards.list(&bob, account.id).await,
            Err(BankError::Forbidden(_))
        ));
        assert!(matches!(
            h.services.cards.issue(&alice, Uuid::new_v4()).await,
            Err(BankError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_tampered_card_is_invisible() {
        let h = harness();
        let alice = h.user("alice").await;
        let account = h.funded_account(&alice, Decimal::ZERO).await;
        let issued = h.services.cards.issue(&alice, account.id).await.unwrap();

        let card = h.repo.get_card_by_id(issued.card_id).await.unwrap().unwrap();
        assert!(h.services.cards.verified_card(card.id).await.is_ok());
        assert!(h.mac.verify(&card));

        // Same record under a new id with one bit of the tag flipped
        let mut forged = card.clone();
        forged.id = Uuid::new_v4();
        let mut tag = hex_decode(&forged.hmac);
        tag[0] ^= 0x01;
        forged.hmac = tag.iter().map(|b| format!("{:02x}", b)).collect();
        h.repo.add_card(&forged).await.unwrap();

        assert!(matches!(
            h.services.cards.verified_card(forged.id).await,
            Err(BankError::Unauthorized(_))
        ));
        let listed = h.services.cards.list(&alice, account.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, card.id);
    }

    #[tokio::test]
    async fn test_cvv_check() {
        let h = harness();
        let alice = h.user("alice").await;
        let account = h.funded_account(&alice, Decimal::ZERO).await;
        let issued = h.services.cards.issue(&alice, account.id).await.unwrap();
        let card = h.services.cards.verified_card(issued.card_id).await.unwrap();

        assert!(h.services.cards.check_cvv(&card, &issued.cvv).is_ok());
        let wrong = if issued.cvv == "000" { "001" } else { "000" };
        assert!(matches!(
            h.services.cards.check_cvv(&card, wrong),
            Err(BankError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_card_unauthorized() {
        let h = harness();
        let err = h.services.cards.verified_card(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, BankError::Unauthorized(_)));
        assert_eq!(err.to_string(), INVALID_CARD);
    }

    fn hex_decode(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }
}
