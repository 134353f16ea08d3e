//! The agency side of the protocol: reading a dataset of bets,
//! splitting it into batches and talking to the server.

use std::{mem, path::Path};

use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
    net::{TcpStream, ToSocketAddrs},
};

use crate::{
    bet::Bet,
    codec::{self, BET_BATCH_TAG},
    protocol::{
        frame::{self, FrameErr},
        message::{Request, Response},
        HEADER_LEN,
    },
};

/// The biggest frame an agency sends, header included
pub const MAX_BATCH_BYTES: usize = 8 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum ClientErr {
    #[error("{0}")]
    Io(#[from] tokio::io::Error),

    #[error("{0}")]
    Frame(#[from] FrameErr),

    #[error("Unexpected reply from the server: {0:?}")]
    UnexpectedReply(String),
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RecordErr {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid document: {0:?}")]
    Document(String),

    #[error("invalid birthdate: {0:?}")]
    Birthdate(String),

    #[error("invalid number: {0:?}")]
    Number(String),
}

/// Parses a dataset line: `first_name,last_name,document,birthdate,number`
pub fn parse_record(line: &str, agency: &str) -> Result<Bet, RecordErr> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    let [first_name, last_name, document, birthdate, number] = fields[..] else {
        return Err(RecordErr::FieldCount(fields.len()));
    };

    if document.parse::<u64>().is_err() {
        return Err(RecordErr::Document(document.into()));
    }
    if !is_iso_date(birthdate) {
        return Err(RecordErr::Birthdate(birthdate.into()));
    }
    if number.parse::<u64>().is_err() {
        return Err(RecordErr::Number(number.into()));
    }

    Ok(Bet {
        agency: agency.into(),
        first_name: first_name.into(),
        last_name: last_name.into(),
        document: document.into(),
        birthdate: birthdate.into(),
        number: number.into(),
    })
}

// YYYY-MM-DD, with a plausible month and day
fn is_iso_date(date: &str) -> bool {
    let mut parts = date.split('-');
    let (Some(year), Some(month), Some(day), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let digits = |part: &str, len: usize| {
        part.len() == len && part.bytes().all(|byte| byte.is_ascii_digit())
    };
    if !digits(year, 4) || !digits(month, 2) || !digits(day, 2) {
        return false;
    }

    matches!(month.parse::<u8>(), Ok(1..=12)) && matches!(day.parse::<u8>(), Ok(1..=31))
}

/// Reads every valid bet in the dataset, skipping malformed lines
pub async fn load_dataset(path: impl AsRef<Path>, agency: &str) -> tokio::io::Result<Vec<Bet>> {
    let file = File::open(path.as_ref()).await?;
    let mut lines = BufReader::new(file).lines();

    let mut bets = vec![];
    let mut line_number = 0;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        match parse_record(&line, agency) {
            Ok(bet) => bets.push(bet),
            Err(err) => tracing::warn!(line = line_number, "skipping malformed bet: {}", err),
        }
    }

    Ok(bets)
}

/// Splits bets into batches of at most `max_amount` bets,
/// whose encoded frame never exceeds [`MAX_BATCH_BYTES`].
///
/// a bet that can't fit in a frame on its own is dropped.
pub fn split_batches(bets: Vec<Bet>, max_amount: usize) -> Vec<Vec<Bet>> {
    let budget = MAX_BATCH_BYTES - HEADER_LEN;

    let mut batches = vec![];
    let mut batch = vec![];
    let mut size = BET_BATCH_TAG.len();

    for bet in bets {
        let len = codec::encode_bet(&bet).len();
        if BET_BATCH_TAG.len() + len > budget {
            tracing::warn!(bytes = len, "single bet is too large, skipping");
            continue;
        }

        // every bet but the first one also needs a separator
        let mut extra = len + usize::from(!batch.is_empty());
        if !batch.is_empty() && (batch.len() >= max_amount || size + extra > budget) {
            batches.push(mem::take(&mut batch));
            size = BET_BATCH_TAG.len();
            extra = len;
        }

        batch.push(bet);
        size += extra;
    }

    if !batch.is_empty() {
        batches.push(batch);
    }

    batches
}

/// Talks to the server on behalf of a single agency.
///
/// each message is sent over its own connection.
#[derive(Debug, Clone)]
pub struct AgencyClient<A> {
    agency: String,
    server: A,
}

impl<A: ToSocketAddrs + Clone> AgencyClient<A> {
    pub fn new(agency: impl Into<String>, server: A) -> Self {
        Self {
            agency: agency.into(),
            server,
        }
    }

    pub fn agency(&self) -> &str {
        &self.agency
    }

    /// Sends a batch of bets and waits for it to be acknowledged
    pub async fn send_batch(&self, bets: &[Bet]) -> Result<(), ClientErr> {
        match self.request(&codec::encode_batch(bets)).await? {
            Response::Ack => Ok(()),
            other => Err(ClientErr::UnexpectedReply(other.to_string())),
        }
    }

    /// Notifies the server that this agency has sent all of its bets
    pub async fn finish(&self) -> Result<(), ClientErr> {
        let mut conn = TcpStream::connect(self.server.clone()).await?;
        frame::write_frame(&mut conn, &Request::batch_end(&self.agency)).await?;

        Ok(())
    }

    /// Asks for this agency's winners.
    ///
    /// returns None while the draw has not run yet.
    pub async fn winners(&self) -> Result<Option<Vec<String>>, ClientErr> {
        match self.request(&Request::get_winners(&self.agency)).await? {
            Response::NotReady => Ok(None),
            Response::Winners(documents) => Ok(Some(documents)),
            Response::Ack => Err(ClientErr::UnexpectedReply(Response::Ack.to_string())),
        }
    }

    async fn request(&self, message: &str) -> Result<Response, ClientErr> {
        let mut conn = TcpStream::connect(self.server.clone()).await?;
        frame::write_frame(&mut conn, message).await?;
        let reply = frame::read_frame(&mut conn).await?;

        match reply.parse() {
            Ok(response) => Ok(response),
            Err(never) => match never {},
        }
    }
}
