//! Shared lottery state: bets, finished agencies and the draw result.
//!
//! Everything lives behind a single lock (see [`SharedLottery`]), so the
//! draw can only ever run once no matter how many agencies finish at the
//! same time.

use std::{collections::HashSet, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    bet::Bet,
    draw::{self, DrawRule, WinnersIndex},
    storage::{BetStore, StorageErr},
};

pub type SharedLottery = Arc<Mutex<Lottery>>;

/// The outcome of an agency reporting that it sent all of its bets
#[derive(Debug, PartialEq, Eq)]
pub enum Completion {
    /// still waiting for other agencies
    Recorded { remaining: usize },

    /// the agency had already finished, or the draw already ran
    AlreadyRecorded,

    /// this agency was the last one, and the draw has run
    Drawn { winners: usize },
}

pub struct Lottery {
    store: Box<dyn BetStore>,
    rule: Box<dyn DrawRule>,
    expected_agencies: usize,
    finished: HashSet<String>,
    // None until the draw has run
    winners: Option<WinnersIndex>,
}

impl Lottery {
    pub fn new(
        store: impl BetStore + 'static,
        rule: impl DrawRule + 'static,
        expected_agencies: usize,
    ) -> Self {
        Self {
            store: Box::new(store),
            rule: Box::new(rule),
            expected_agencies,
            finished: HashSet::default(),
            winners: None,
        }
    }

    pub fn shared(self) -> SharedLottery {
        Arc::new(Mutex::new(self))
    }

    pub async fn store_bets(&mut self, bets: Vec<Bet>) -> Result<(), StorageErr> {
        self.store.store(bets).await
    }

    /// Marks the agency as finished, and runs the draw once every expected agency did.
    ///
    /// finishing the same agency twice is a no-op. if a previous draw attempt
    /// failed to load the bets, the next call retries it.
    pub async fn finish_agency(&mut self, agency: String) -> Result<Completion, StorageErr> {
        let newly_finished = self.finished.insert(agency);

        if self.is_drawn() {
            return Ok(Completion::AlreadyRecorded);
        }

        if self.finished.len() < self.expected_agencies {
            if newly_finished {
                return Ok(Completion::Recorded {
                    remaining: self.expected_agencies - self.finished.len(),
                });
            }
            return Ok(Completion::AlreadyRecorded);
        }

        let winners = draw::run(self.store.as_mut(), self.rule.as_ref()).await?;
        let count = winners.values().map(Vec::len).sum();
        self.winners = Some(winners);

        Ok(Completion::Drawn { winners: count })
    }

    pub fn is_drawn(&self) -> bool {
        self.winners.is_some()
    }

    pub fn finished_agencies(&self) -> usize {
        self.finished.len()
    }

    /// The documents of the agency's winning bets.
    ///
    /// returns None while the draw has not run yet, and an
    /// empty list for agencies without winners.
    pub fn winners(&self, agency: &str) -> Option<Vec<String>> {
        let winners = self.winners.as_ref()?;
        Some(winners.get(agency).cloned().unwrap_or_default())
    }
}
