use std::path::PathBuf;

use async_trait::async_trait;
use tokio::{
    fs::OpenOptions,
    io::{AsyncWriteExt, BufWriter},
};

use crate::{bet::Bet, codec};

#[derive(thiserror::Error, Debug)]
pub enum StorageErr {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: tokio::io::Error,
    },
}

/// Durable storage for every bet received by the server
#[async_trait]
pub trait BetStore: Send {
    /// Appends the bets to the store, in order
    async fn store(&mut self, bets: Vec<Bet>) -> Result<(), StorageErr>;

    /// Loads every bet stored so far, in the order they were stored
    async fn load_all(&mut self) -> Result<Vec<Bet>, StorageErr>;
}

/// Stores bets in a file, one encoded record per line
#[derive(Debug)]
pub struct FileBetStore {
    path: PathBuf,
}

impl FileBetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_err(&self, source: tokio::io::Error) -> StorageErr {
        StorageErr::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl BetStore for FileBetStore {
    async fn store(&mut self, bets: Vec<Bet>) -> Result<(), StorageErr> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| self.io_err(err))?;

        // use a buffer to avoid a syscall per bet
        let mut writer = BufWriter::new(file);
        for bet in bets {
            // a line break inside a value would split the record in two
            let mut line = codec::encode_bet(&bet).replace(['\r', '\n'], " ");
            line.push('\n');

            writer
                .write_all(line.as_bytes())
                .await
                .map_err(|err| self.io_err(err))?;
        }

        writer.flush().await.map_err(|err| self.io_err(err))
    }

    async fn load_all(&mut self) -> Result<Vec<Bet>, StorageErr> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            // nothing was stored yet
            Err(err) if err.kind() == tokio::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(self.io_err(err)),
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(codec::decode_bet)
            .collect())
    }
}

/// Keeps all bets in memory, nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryBetStore {
    bets: Vec<Bet>,
}

#[async_trait]
impl BetStore for MemoryBetStore {
    async fn store(&mut self, mut bets: Vec<Bet>) -> Result<(), StorageErr> {
        self.bets.append(&mut bets);
        Ok(())
    }

    async fn load_all(&mut self) -> Result<Vec<Bet>, StorageErr> {
        Ok(self.bets.clone())
    }
}
