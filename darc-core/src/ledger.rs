use crate::address::Address;
use crate::error::ExecutionError;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token classes are numbered sequentially from zero
pub type TokenClassId = u64;

/// Token amounts and balances
pub type Amount = u128;

/// Change in owner-set membership caused by a single balance update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnershipChange {
    /// Balance went from zero to positive; the address was appended to the owner set
    BecameOwner,
    /// Balance returned to zero; the address was removed from the owner set
    CeasedOwner,
}

/// Before and after balance of one (class, address) pair touched by a mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEffect {
    pub class_id: TokenClassId,
    pub address: Address,
    pub before: Amount,
    pub after: Amount,
    pub ownership: Option<OwnershipChange>,
}

/// Balances of a single token class.
///
/// Only positive balances are stored, and `owners` lists exactly the keys of
/// `balances` in the order they first became positive. Both are updated in
/// one place, `set_balance`, so membership can never drift from the balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Holdings {
    balances: HashMap<Address, Amount>,
    owners: Vec<Address>,
}

impl Holdings {
    fn balance_of(&self, address: &Address) -> Amount {
        self.balances.get(address).copied().unwrap_or(0)
    }

    fn set_balance(&mut self, address: Address, after: Amount) -> Option<OwnershipChange> {
        let before = self.balance_of(&address);

        match (before > 0, after > 0) {
            (false, true) => {
                self.balances.insert(address, after);
                self.owners.push(address);
                Some(OwnershipChange::BecameOwner)
            }
            (true, false) => {
                self.balances.remove(&address);
                if let Some(position) = self.owners.iter().position(|owner| *owner == address) {
                    self.owners.remove(position);
                }
                Some(OwnershipChange::CeasedOwner)
            }
            (true, true) => {
                self.balances.insert(address, after);
                None
            }
            (false, false) => None,
        }
    }
}

/// A fungible token type managed by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClass {
    pub id: TokenClassId,
    pub labels: Vec<String>,
    pub voting_weight: Amount,
    pub dividend_weight: Amount,
    total_supply: Amount,
    holdings: Holdings,
}

impl TokenClass {
    /// Sum of all balances of this class
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Addresses holding a positive balance, in the order they became holders
    pub fn owners(&self) -> &[Address] {
        &self.holdings.owners
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.holdings.balance_of(address)
    }
}

/// The token ledger: every token class and its balances
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    classes: Vec<TokenClass>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next created class will receive
    pub fn next_class_id(&self) -> TokenClassId {
        self.classes.len() as TokenClassId
    }

    pub fn token_class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn token_class(&self, class_id: TokenClassId) -> Option<&TokenClass> {
        usize::try_from(class_id)
            .ok()
            .and_then(|index| self.classes.get(index))
    }

    pub fn token_classes(&self) -> impl Iterator<Item = &TokenClass> {
        self.classes.iter()
    }

    /// Create a token class with zero voting and dividend weight
    pub fn create_token_class(&mut self, labels: Vec<String>) -> TokenClassId {
        self.create_token_class_with_weights(labels, 0, 0)
    }

    /// Create a token class, allocating the next sequential id
    pub fn create_token_class_with_weights(
        &mut self,
        labels: Vec<String>,
        voting_weight: Amount,
        dividend_weight: Amount,
    ) -> TokenClassId {
        let id = self.next_class_id();
        trace!("creating token class {} with labels {:?}", id, labels);

        self.classes.push(TokenClass {
            id,
            labels,
            voting_weight,
            dividend_weight,
            total_supply: 0,
            holdings: Holdings::default(),
        });
        id
    }

    /// Increase the balance of `address` by `amount`
    pub fn mint(
        &mut self,
        class_id: TokenClassId,
        address: Address,
        amount: Amount,
    ) -> Result<LedgerEffect, ExecutionError> {
        let class = self.class_mut(class_id)?;
        let before = class.holdings.balance_of(&address);

        let overflow = || ExecutionError::BalanceOverflow { class_id, address };
        let after = before.checked_add(amount).ok_or_else(overflow)?;
        let total_supply = class.total_supply.checked_add(amount).ok_or_else(overflow)?;

        class.total_supply = total_supply;
        let ownership = class.holdings.set_balance(address, after);
        trace!("minted {} of class {} to {}", amount, class_id, address);

        Ok(LedgerEffect {
            class_id,
            address,
            before,
            after,
            ownership,
        })
    }

    /// Decrease the balance of `address` by `amount`
    pub fn burn(
        &mut self,
        class_id: TokenClassId,
        address: Address,
        amount: Amount,
    ) -> Result<LedgerEffect, ExecutionError> {
        let class = self.class_mut(class_id)?;
        let before = class.holdings.balance_of(&address);

        let after = before
            .checked_sub(amount)
            .ok_or(ExecutionError::InsufficientBalance {
                class_id,
                address,
                balance: before,
                requested: amount,
            })?;

        // total supply is the sum of all balances, so it cannot be smaller than one of them
        class.total_supply -= amount;
        let ownership = class.holdings.set_balance(address, after);
        trace!("burned {} of class {} from {}", amount, class_id, address);

        Ok(LedgerEffect {
            class_id,
            address,
            before,
            after,
            ownership,
        })
    }

    /// Move `amount` of a class from one address to another.
    ///
    /// Fails before mutating anything if `from` cannot cover the amount. A
    /// transfer to the same address only checks the balance.
    pub fn transfer(
        &mut self,
        class_id: TokenClassId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<Vec<LedgerEffect>, ExecutionError> {
        let class = self.class_mut(class_id)?;
        let balance = class.holdings.balance_of(&from);
        if balance < amount {
            return Err(ExecutionError::InsufficientBalance {
                class_id,
                address: from,
                balance,
                requested: amount,
            });
        }

        if from == to {
            return Ok(Vec::new());
        }

        let burned = self.burn(class_id, from, amount)?;
        let minted = self.mint(class_id, to, amount)?;
        Ok(vec![burned, minted])
    }

    /// Balance of `address` in a class; zero for unknown classes
    pub fn balance_of(&self, class_id: TokenClassId, address: &Address) -> Amount {
        self.token_class(class_id)
            .map(|class| class.balance_of(address))
            .unwrap_or(0)
    }

    /// Current owners of a class in the order they became holders; empty for unknown classes
    pub fn owners_of(&self, class_id: TokenClassId) -> Vec<Address> {
        self.token_class(class_id)
            .map(|class| class.owners().to_vec())
            .unwrap_or_default()
    }

    pub fn is_owner(&self, class_id: TokenClassId, address: &Address) -> bool {
        self.balance_of(class_id, address) > 0
    }

    pub fn total_supply(&self, class_id: TokenClassId) -> Amount {
        self.token_class(class_id)
            .map(TokenClass::total_supply)
            .unwrap_or(0)
    }

    fn class_mut(&mut self, class_id: TokenClassId) -> Result<&mut TokenClass, ExecutionError> {
        usize::try_from(class_id)
            .ok()
            .and_then(|index| self.classes.get_mut(index))
            .ok_or(ExecutionError::UnknownTokenClass(class_id))
    }
}
