use crate::error::TokenError;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Supply and per-address balances of one token.
///
/// `total_supply` starts at the amount given to `create_token` without crediting
/// any holder, so it can exceed `holder_sum()`. Mint and burn move both sides
/// by the same amount.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    total_supply: u64,
    holders: BTreeMap<String, u64>,
}

impl Token {
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    pub fn holders(&self) -> &BTreeMap<String, u64> {
        &self.holders
    }

    /// Missing holders have a zero balance.
    pub fn balance_of(&self, address: &str) -> u64 {
        self.holders.get(address).copied().unwrap_or(0)
    }

    pub fn holder_sum(&self) -> u64 {
        self.holders.values().sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRegistry {
    tokens: BTreeMap<String, Token>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, name: &str, initial_supply: u64) -> Result<(), TokenError> {
        match self.tokens.entry(name.to_string()) {
            Entry::Occupied(_) => Err(TokenError::DuplicateToken(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Token {
                    total_supply: initial_supply,
                    holders: BTreeMap::new(),
                });
                info!(token = name, initial_supply, "token created");
                Ok(())
            }
        }
    }

    pub fn mint(&mut self, name: &str, amount: u64, to: &str) -> Result<(), TokenError> {
        let token = self.token_mut(name)?;
        let overflow = || TokenError::SupplyOverflow {
            token: name.to_string(),
        };
        let supply = token.total_supply.checked_add(amount).ok_or_else(overflow)?;
        let balance = token.balance_of(to).checked_add(amount).ok_or_else(overflow)?;

        token.total_supply = supply;
        token.holders.insert(to.to_string(), balance);
        debug!(token = name, amount, to, supply, "minted");
        Ok(())
    }

    pub fn burn(&mut self, name: &str, amount: u64, from: &str) -> Result<(), TokenError> {
        let token = self.token_mut(name)?;
        let available = token.balance_of(from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                token: name.to_string(),
                address: from.to_string(),
                requested: amount,
                available,
            });
        }

        // A zero burn from an unknown address leaves the holder map untouched.
        if let Some(balance) = token.holders.get_mut(from) {
            *balance -= amount;
        }
        token.total_supply -= amount;
        debug!(token = name, amount, from, supply = token.total_supply, "burned");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Token> {
        self.tokens.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tokens.contains_key(name)
    }

    pub fn balance_of(&self, name: &str, address: &str) -> Option<u64> {
        self.get(name).map(|t| t.balance_of(address))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Token)> {
        self.tokens.iter()
    }

    fn token_mut(&mut self, name: &str) -> Result<&mut Token, TokenError> {
        self.tokens
            .get_mut(name)
            .ok_or_else(|| TokenError::UnknownToken(name.to_string()))
    }
}
