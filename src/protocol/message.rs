use std::{convert::Infallible, fmt, str::FromStr};

use crate::{bet::Bet, codec};

pub const ACK: &str = "ACK";
pub const NOT_READY: &str = "ERROR:NOT_ALL_BATCHES_RECEIVED";

const GET_WINNERS_PREFIX: &str = "GET_WINNERS:";
const BET_BATCH_PREFIX: &str = "BET_BATCH";
const BATCH_END_PREFIX: &str = "BATCH_END:";

#[derive(Debug, PartialEq)]
pub enum Request {
    GetWinners { agency: String },
    BetBatch { bets: Vec<Bet> },
    BatchEnd { agency: String },
    // anything we don't recognize, it is still acknowledged
    Other(String),
}

impl FromStr for Request {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let request = if let Some(agency) = s.strip_prefix(GET_WINNERS_PREFIX) {
            Self::GetWinners {
                agency: agency.trim().into(),
            }
        } else if s.starts_with(BET_BATCH_PREFIX) {
            Self::BetBatch {
                bets: codec::decode_batch(s),
            }
        } else if let Some(agency) = s.strip_prefix(BATCH_END_PREFIX) {
            Self::BatchEnd {
                agency: agency.trim().into(),
            }
        } else {
            Self::Other(s.into())
        };

        Ok(request)
    }
}

impl Request {
    pub fn get_winners(agency: &str) -> String {
        format!("{}{}", GET_WINNERS_PREFIX, agency)
    }

    pub fn batch_end(agency: &str) -> String {
        format!("{}{}", BATCH_END_PREFIX, agency)
    }
}

#[derive(Debug, PartialEq)]
pub enum Response {
    Ack,
    NotReady,
    Winners(Vec<String>),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => f.write_str(ACK),
            Self::NotReady => f.write_str(NOT_READY),
            Self::Winners(documents) => f.write_str(&codec::encode_winners(documents)),
        }
    }
}

impl FromStr for Response {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let response = match s.trim() {
            ACK => Self::Ack,
            NOT_READY => Self::NotReady,
            documents => Self::Winners(codec::decode_winners(documents)),
        };

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::{Request, Response};
    use crate::bet::Bet;

    #[test]
    fn check_request_parsing() {
        let raw_requests = [
            "GET_WINNERS:3",
            "GET_WINNERS: 12 \n",
            "BET_BATCH;agency:1|dni:7;agency:1|dni:8",
            "BATCH_END:4",
            "HELLO",
            "",
        ];

        let expected_requests = [
            Request::GetWinners { agency: "3".into() },
            Request::GetWinners {
                agency: "12".into(),
            },
            Request::BetBatch {
                bets: vec![
                    Bet {
                        agency: "1".into(),
                        document: "7".into(),
                        ..Default::default()
                    },
                    Bet {
                        agency: "1".into(),
                        document: "8".into(),
                        ..Default::default()
                    },
                ],
            },
            Request::BatchEnd { agency: "4".into() },
            Request::Other("HELLO".into()),
            Request::Other("".into()),
        ];

        for (raw, expected) in raw_requests.into_iter().zip(expected_requests.iter()) {
            let request: Request = raw.parse().unwrap();
            assert_eq!(request, *expected);
        }
    }

    #[test]
    fn check_request_builders() {
        assert_eq!(
            Request::get_winners("2").parse::<Request>().unwrap(),
            Request::GetWinners { agency: "2".into() }
        );
        assert_eq!(
            Request::batch_end("2").parse::<Request>().unwrap(),
            Request::BatchEnd { agency: "2".into() }
        );
    }

    #[test]
    fn check_responses() {
        assert_eq!(Response::Ack.to_string(), "ACK");
        assert_eq!(
            Response::NotReady.to_string(),
            "ERROR:NOT_ALL_BATCHES_RECEIVED"
        );
        assert_eq!(Response::Winners(vec![]).to_string(), "");
        assert_eq!(
            Response::Winners(vec!["1".into(), "22".into()]).to_string(),
            "1;22"
        );

        assert_eq!("ACK".parse::<Response>().unwrap(), Response::Ack);
        assert_eq!(
            "ERROR:NOT_ALL_BATCHES_RECEIVED".parse::<Response>().unwrap(),
            Response::NotReady
        );
        assert_eq!(
            "".parse::<Response>().unwrap(),
            Response::Winners(vec![])
        );
    }
}
