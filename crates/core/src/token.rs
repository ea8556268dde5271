use std::collections::BTreeMap;

use tracing::trace;

use crate::{Address, Amount, Error};

/// Fungible token balances, keyed by token address.
///
/// This is the boundary to the token contracts the engine moves funds
/// through. Implementations must reject a transfer as a whole: when an error
/// is returned no balance or allowance has changed.
pub trait TokenStore {
    fn balance_of(&self, token: &Address, holder: &Address) -> Amount;

    fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount;

    fn total_supply(&self, token: &Address) -> Amount;

    fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: Amount);

    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), Error>;

    /// Moves funds on behalf of `from`, spending `spender`'s allowance
    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), Error>;

    fn mint(&mut self, token: &Address, to: &Address, amount: Amount) -> Result<(), Error>;

    /// Checks that minting `amount` more of `token` would succeed
    fn ensure_mintable(&self, token: &Address, amount: Amount) -> Result<(), Error> {
        self.total_supply(token)
            .checked_add(amount)
            .map(|_| ())
            .ok_or(Error::Overflow)
    }

    /// Checks that `transfer_from` would succeed, without moving anything
    fn ensure_transferable(
        &self,
        token: &Address,
        spender: &Address,
        from: &Address,
        amount: Amount,
    ) -> Result<(), Error> {
        let available = self.balance_of(token, from);

        if available < amount {
            return Err(Error::InsufficientBalance {
                token: *token,
                needed: amount,
                available,
            });
        }

        if spender != from {
            let allowed = self.allowance(token, from, spender);

            if allowed < amount {
                return Err(Error::InsufficientAllowance {
                    token: *token,
                    needed: amount,
                    available: allowed,
                });
            }
        }

        Ok(())
    }
}

/// In-memory token balances
#[derive(Debug, Default, Clone)]
pub struct MemoryTokens {
    balances: BTreeMap<(Address, Address), Amount>,
    allowances: BTreeMap<(Address, Address, Address), Amount>,
    supplies: BTreeMap<Address, Amount>,
}

impl MemoryTokens {
    pub fn new() -> Self {
        Self::default()
    }

    fn debit(&mut self, token: &Address, holder: &Address, amount: Amount) {
        let entry = self.balances.entry((*token, *holder)).or_default();
        *entry -= amount;
    }

    fn credit(&mut self, token: &Address, holder: &Address, amount: Amount) -> Result<(), Error> {
        let entry = self.balances.entry((*token, *holder)).or_default();
        *entry = entry.checked_add(amount).ok_or(Error::Overflow)?;
        Ok(())
    }
}

impl TokenStore for MemoryTokens {
    fn balance_of(&self, token: &Address, holder: &Address) -> Amount {
        self.balances
            .get(&(*token, *holder))
            .copied()
            .unwrap_or_default()
    }

    fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*token, *owner, *spender))
            .copied()
            .unwrap_or_default()
    }

    fn total_supply(&self, token: &Address) -> Amount {
        self.supplies.get(token).copied().unwrap_or_default()
    }

    fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: Amount) {
        trace!(%token, %owner, %spender, amount, "approve");
        self.allowances.insert((*token, *owner, *spender), amount);
    }

    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), Error> {
        self.ensure_transferable(token, from, from, amount)?;

        if amount == 0 || from == to {
            return Ok(());
        }

        self.debit(token, from, amount);
        self.credit(token, to, amount)?;

        trace!(%token, %from, %to, amount, "transfer");

        Ok(())
    }

    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), Error> {
        self.ensure_transferable(token, spender, from, amount)?;

        if spender != from {
            let allowed = self.allowance(token, from, spender);
            self.allowances
                .insert((*token, *from, *spender), allowed - amount);
        }

        if amount == 0 || from == to {
            return Ok(());
        }

        self.debit(token, from, amount);
        self.credit(token, to, amount)?;

        trace!(%token, %spender, %from, %to, amount, "transfer from");

        Ok(())
    }

    fn mint(&mut self, token: &Address, to: &Address, amount: Amount) -> Result<(), Error> {
        let supply = self.total_supply(token);
        let supply = supply.checked_add(amount).ok_or(Error::Overflow)?;

        self.credit(token, to, amount)?;
        self.supplies.insert(*token, supply);

        trace!(%token, %to, amount, "mint");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (MemoryTokens, Address, Address, Address) {
        let token = Address::derive("fxs");
        let alice = Address::derive("alice");
        let bob = Address::derive("bob");

        let mut tokens = MemoryTokens::new();
        tokens.mint(&token, &alice, 100).unwrap();

        (tokens, token, alice, bob)
    }

    #[test]
    fn transfer_moves_balance() {
        let (mut tokens, token, alice, bob) = setup();

        tokens.transfer(&token, &alice, &bob, 40).unwrap();

        assert_eq!(tokens.balance_of(&token, &alice), 60);
        assert_eq!(tokens.balance_of(&token, &bob), 40);
        assert_eq!(tokens.total_supply(&token), 100);
    }

    #[test]
    fn transfer_rejects_overdraft() {
        let (mut tokens, token, alice, bob) = setup();

        let err = tokens.transfer(&token, &alice, &bob, 101).unwrap_err();

        assert_eq!(err.reason(), "insufficient balance");
        assert_eq!(tokens.balance_of(&token, &alice), 100);
    }

    #[test]
    fn transfer_from_spends_allowance() {
        let (mut tokens, token, alice, bob) = setup();
        let locker = Address::derive("locker");

        let err = tokens
            .transfer_from(&token, &locker, &alice, &locker, 10)
            .unwrap_err();
        assert_eq!(err.reason(), "insufficient allowance");

        tokens.approve(&token, &alice, &locker, 30);
        tokens
            .transfer_from(&token, &locker, &alice, &locker, 10)
            .unwrap();

        assert_eq!(tokens.allowance(&token, &alice, &locker), 20);
        assert_eq!(tokens.balance_of(&token, &locker), 10);
        assert_eq!(tokens.balance_of(&token, &bob), 0);
    }
}
