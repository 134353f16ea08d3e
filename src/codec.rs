//! Text encoding of bets, batches and winner lists.

use crate::bet::Bet;

pub const BET_BATCH_TAG: &str = "BET_BATCH;";

const RECORD_SEPARATOR: char = ';';

/// Decodes a single `key:value|key:value` bet record
pub fn decode_bet(record: &str) -> Bet {
    match record.parse() {
        Ok(bet) => bet,
        Err(never) => match never {},
    }
}

pub fn encode_bet(bet: &Bet) -> String {
    bet.to_string()
}

/// Decodes a batch of bets.
///
/// the `BET_BATCH;` tag is stripped if present, empty records are skipped.
pub fn decode_batch(payload: &str) -> Vec<Bet> {
    let payload = payload.strip_prefix(BET_BATCH_TAG).unwrap_or(payload);

    payload
        .trim()
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
        .map(decode_bet)
        .collect()
}

pub fn encode_batch(bets: &[Bet]) -> String {
    let mut payload = String::from(BET_BATCH_TAG);
    for (idx, bet) in bets.iter().enumerate() {
        if idx > 0 {
            payload.push(RECORD_SEPARATOR);
        }
        payload += &encode_bet(bet);
    }

    payload
}

pub fn encode_winners<S: AsRef<str>>(documents: &[S]) -> String {
    documents
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(";")
}

pub fn decode_winners(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![];
    }

    text.split(RECORD_SEPARATOR)
        .map(|document| document.trim().to_string())
        .collect()
}
