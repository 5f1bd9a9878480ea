//! The currency players spend on cages.

use std::collections::HashMap;

use skyarena_protocol::PlayerName;

/// A wallet provider. The host usually supplies one backed by its own
/// economy; [`Ledger`] keeps balances in memory.
pub trait Economy {
    fn balance(&self, player: &PlayerName) -> u64;

    /// Takes `amount` from the player. Returns `false`, and takes
    /// nothing, when the balance is too low.
    fn withdraw(&mut self, player: &PlayerName, amount: u64) -> bool;
}

/// In-memory balances.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    balances: HashMap<PlayerName, u64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&mut self, player: PlayerName, amount: u64) {
        let balance = self.balances.entry(player).or_insert(0);
        *balance = balance.saturating_add(amount);
    }
}

impl Economy for Ledger {
    fn balance(&self, player: &PlayerName) -> u64 {
        self.balances.get(player).copied().unwrap_or(0)
    }

    fn withdraw(&mut self, player: &PlayerName, amount: u64) -> bool {
        match self.balances.get_mut(player) {
            Some(balance) if *balance >= amount => {
                *balance -= amount;
                true
            }
            _ => amount == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdraw_requires_funds() {
        let mut ledger = Ledger::new();
        let alex = PlayerName::from("Alex");
        ledger.deposit(alex.clone(), 100);

        assert!(!ledger.withdraw(&alex, 150));
        assert_eq!(ledger.balance(&alex), 100);
        assert!(ledger.withdraw(&alex, 60));
        assert_eq!(ledger.balance(&alex), 40);
    }

    #[test]
    fn test_free_withdraw_always_succeeds() {
        let mut ledger = Ledger::new();
        assert!(ledger.withdraw(&PlayerName::from("Broke"), 0));
    }
}
