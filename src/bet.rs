use std::{convert::Infallible, fmt, str::FromStr};

pub const DEFAULT_AGENCY: &str = "0";
pub const DEFAULT_BIRTHDATE: &str = "1900-01-01";
pub const DEFAULT_NUMBER: &str = "0";

/// A single bet, as submitted by an agency.
///
/// Every field is always populated, missing values take the defaults above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bet {
    pub agency: String,
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    pub birthdate: String,
    pub number: String,
}

impl Default for Bet {
    fn default() -> Self {
        Self {
            agency: DEFAULT_AGENCY.into(),
            first_name: String::new(),
            last_name: String::new(),
            document: String::new(),
            birthdate: DEFAULT_BIRTHDATE.into(),
            number: DEFAULT_NUMBER.into(),
        }
    }
}

// The recognized keys of a bet record
mod keys {
    pub const AGENCY: &str = "agency";
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const DOCUMENT: &str = "dni";
    pub const BIRTHDATE: &str = "birthdate";
    pub const NUMBER: &str = "number";
}

impl FromStr for Bet {
    type Err = Infallible;

    /// Parses a `|` separated list of `key:value` fields.
    ///
    /// unknown keys and fields without a `:` are ignored,
    /// when a key repeats the last occurrence wins.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bet = Bet::default();

        for field in s.trim().split('|') {
            let Some((key, value)) = field.split_once(':') else {
                continue;
            };

            let slot = match key {
                keys::AGENCY => &mut bet.agency,
                keys::FIRST_NAME => &mut bet.first_name,
                keys::LAST_NAME => &mut bet.last_name,
                keys::DOCUMENT => &mut bet.document,
                keys::BIRTHDATE => &mut bet.birthdate,
                keys::NUMBER => &mut bet.number,
                _ => continue,
            };
            *slot = value.to_string();
        }

        Ok(bet)
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}|{}:{}|{}:{}|{}:{}|{}:{}|{}:{}",
            keys::AGENCY,
            self.agency,
            keys::FIRST_NAME,
            self.first_name,
            keys::LAST_NAME,
            self.last_name,
            keys::DOCUMENT,
            self.document,
            keys::BIRTHDATE,
            self.birthdate,
            keys::NUMBER,
            self.number
        )
    }
}
