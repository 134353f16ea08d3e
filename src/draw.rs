use std::collections::HashMap;

use crate::{
    bet::Bet,
    storage::{BetStore, StorageErr},
};

/// The winning number used by the lottery unless configured otherwise
pub const DEFAULT_WINNING_NUMBER: u64 = 7574;

/// Documents of the winning bets, grouped by agency
pub type WinnersIndex = HashMap<String, Vec<String>>;

/// Decides whether a bet is a winner
pub trait DrawRule: Send + Sync {
    fn has_won(&self, bet: &Bet) -> bool;
}

/// A bet wins when it played exactly this number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinningNumber(pub u64);

impl Default for WinningNumber {
    fn default() -> Self {
        Self(DEFAULT_WINNING_NUMBER)
    }
}

impl DrawRule for WinningNumber {
    fn has_won(&self, bet: &Bet) -> bool {
        bet.number.trim().parse::<u64>() == Ok(self.0)
    }
}

impl<F> DrawRule for F
where
    F: Fn(&Bet) -> bool + Send + Sync,
{
    fn has_won(&self, bet: &Bet) -> bool {
        self(bet)
    }
}

/// Scans every stored bet and builds the winners index.
///
/// winners keep the order in which the store returned them.
pub async fn run(
    store: &mut dyn BetStore,
    rule: &dyn DrawRule,
) -> Result<WinnersIndex, StorageErr> {
    let mut winners = WinnersIndex::new();

    for bet in store.load_all().await? {
        if rule.has_won(&bet) {
            winners.entry(bet.agency).or_default().push(bet.document);
        }
    }

    Ok(winners)
}
