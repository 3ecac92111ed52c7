use std::collections::BTreeMap;

use debtmarket_crypto::Address;
use serde::{Deserialize, Serialize};

use crate::error::DebtMarketError;
use crate::overlay::Overlay;
use crate::types::TokenId;

/// Ownership claim on one agreement's repayment stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtTokenRecord {
    pub token_id: TokenId,
    pub owner: Address,
    /// Single approved spender, cleared on every transfer.
    pub approved: Option<Address>,
}

/// Committed debt-token ownership.
#[derive(Debug, Clone, Default)]
pub struct DebtToken {
    tokens: BTreeMap<TokenId, DebtTokenRecord>,
}

impl DebtToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, id: &TokenId) -> bool {
        self.tokens.contains_key(id)
    }

    pub fn owner_of(&self, id: &TokenId) -> Result<Address, DebtMarketError> {
        self.record(id).map(|r| r.owner)
    }

    pub fn get_approved(&self, id: &TokenId) -> Result<Option<Address>, DebtMarketError> {
        self.record(id).map(|r| r.approved)
    }

    pub fn balance_of(&self, owner: &Address) -> usize {
        self.tokens.values().filter(|r| r.owner == *owner).count()
    }

    pub fn tokens_of<'s>(&'s self, owner: &'s Address) -> impl Iterator<Item = &'s TokenId> + 's {
        self.tokens
            .values()
            .filter(move |r| r.owner == *owner)
            .map(|r| &r.token_id)
    }

    pub fn total_supply(&self) -> usize {
        self.tokens.len()
    }

    fn record(&self, id: &TokenId) -> Result<&DebtTokenRecord, DebtMarketError> {
        self.tokens.get(id).ok_or(DebtMarketError::UnknownToken(*id))
    }

    pub(crate) fn view(&self) -> TokenView<'_> {
        TokenView {
            overlay: Overlay::new(&self.tokens),
        }
    }

    pub(crate) fn apply(&mut self, staged: BTreeMap<TokenId, DebtTokenRecord>) {
        self.tokens.extend(staged);
    }
}

/// Staged token writes inside a transaction.
#[derive(Debug)]
pub(crate) struct TokenView<'a> {
    overlay: Overlay<'a, TokenId, DebtTokenRecord>,
}

impl<'a> TokenView<'a> {
    pub(crate) fn exists(&self, id: &TokenId) -> bool {
        self.overlay.contains_key(id)
    }

    pub(crate) fn owner_of(&self, id: &TokenId) -> Result<Address, DebtMarketError> {
        self.overlay
            .get(id)
            .map(|r| r.owner)
            .ok_or(DebtMarketError::UnknownToken(*id))
    }

    pub(crate) fn get_approved(&self, id: &TokenId) -> Result<Option<Address>, DebtMarketError> {
        self.overlay
            .get(id)
            .map(|r| r.approved)
            .ok_or(DebtMarketError::UnknownToken(*id))
    }

    pub(crate) fn mint(&mut self, id: TokenId, to: Address) -> Result<(), DebtMarketError> {
        if to.is_null() {
            return Err(DebtMarketError::InvalidRecipient(to));
        }
        if self.exists(&id) {
            return Err(DebtMarketError::OrderAlreadyFilled(id));
        }
        self.overlay.insert(
            id,
            DebtTokenRecord {
                token_id: id,
                owner: to,
                approved: None,
            },
        );
        Ok(())
    }

    /// Owner-initiated transfer. Returns the previous owner.
    pub(crate) fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        id: &TokenId,
    ) -> Result<Address, DebtMarketError> {
        let record = self
            .overlay
            .get_mut(id)
            .ok_or(DebtMarketError::UnknownToken(*id))?;
        if record.owner != caller {
            return Err(DebtMarketError::unauthorized(caller, "transfer debt token"));
        }
        if to.is_null() {
            return Err(DebtMarketError::InvalidRecipient(to));
        }
        let from = record.owner;
        record.owner = to;
        record.approved = None;
        Ok(from)
    }

    /// Transfer by the approved spender. Returns the previous owner.
    pub(crate) fn transfer_approved(
        &mut self,
        spender: Address,
        to: Address,
        id: &TokenId,
    ) -> Result<Address, DebtMarketError> {
        let record = self
            .overlay
            .get_mut(id)
            .ok_or(DebtMarketError::UnknownToken(*id))?;
        if record.approved != Some(spender) {
            return Err(DebtMarketError::unauthorized(
                spender,
                "transfer unapproved debt token",
            ));
        }
        if to.is_null() {
            return Err(DebtMarketError::InvalidRecipient(to));
        }
        let from = record.owner;
        record.owner = to;
        record.approved = None;
        Ok(from)
    }

    pub(crate) fn approve(
        &mut self,
        caller: Address,
        spender: Option<Address>,
        id: &TokenId,
    ) -> Result<(), DebtMarketError> {
        let record = self
            .overlay
            .get_mut(id)
            .ok_or(DebtMarketError::UnknownToken(*id))?;
        if record.owner != caller {
            return Err(DebtMarketError::unauthorized(caller, "approve debt token"));
        }
        record.approved = spender.filter(|s| !s.is_null());
        Ok(())
    }

    pub(crate) fn into_staged(self) -> BTreeMap<TokenId, DebtTokenRecord> {
        self.overlay.into_staged()
    }
}
