use std::{net::SocketAddr, time::Duration};

use tokio::{
    net::{TcpListener, TcpSocket},
    sync::watch,
    task::JoinSet,
};

use crate::{lottery::SharedLottery, session};

/// How long a single accept may block before the shutdown flag is checked again
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Accepts connections and serves each one on its own task
pub struct Server {
    listener: TcpListener,
    lottery: SharedLottery,
    sessions: JoinSet<()>,
}

impl Server {
    /// Binds the listening socket with a bounded backlog
    pub fn bind(
        addr: SocketAddr,
        backlog: u32,
        lottery: SharedLottery,
    ) -> tokio::io::Result<Self> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(backlog)?;

        Ok(Self {
            listener,
            lottery,
            sessions: JoinSet::new(),
        })
    }

    pub fn local_addr(&self) -> tokio::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the shutdown flag is raised.
    ///
    /// once it is, no new connection is accepted, and every
    /// in-flight session is waited for before the socket is closed.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) {
        tracing::info!("action: accept_connections | result: in_progress");

        while !shutting_down(&shutdown) {
            self.reap_sessions();

            let (mut conn, addr) =
                match tokio::time::timeout(ACCEPT_POLL_INTERVAL, self.listener.accept()).await {
                    Ok(Ok(accepted)) => accepted,
                    Ok(Err(err)) => {
                        tracing::warn!(
                            "action: accept_connections | result: fail | error: {}",
                            err
                        );
                        continue;
                    }
                    // nothing to accept, check the flag again
                    Err(_) => continue,
                };

            tracing::info!(ip = %addr.ip(), "action: accept_connections | result: success");

            let lottery = self.lottery.clone();
            self.sessions.spawn(async move {
                if let Err(err) = session::handle(&mut conn, &lottery).await {
                    tracing::error!(
                        ip = %addr.ip(),
                        "action: handle_session | result: fail | error: {}",
                        err
                    );
                }
            });
        }

        tracing::info!(
            in_flight = self.sessions.len(),
            "action: shutdown | result: in_progress"
        );
        while let Some(result) = self.sessions.join_next().await {
            log_session_result(result);
        }

        drop(self.listener);
        tracing::info!("action: shutdown_server_socket | result: success");
    }

    // collect the sessions that already finished
    fn reap_sessions(&mut self) {
        while let Some(result) = self.sessions.try_join_next() {
            log_session_result(result);
        }
    }
}

fn shutting_down(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

fn log_session_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        tracing::error!("action: join_session | result: fail | error: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use async_tempfile::TempFile;
    use tokio::{io::AsyncWriteExt, net::TcpStream, task::JoinHandle};

    use super::*;
    use crate::{
        bet::Bet,
        codec,
        draw::WinningNumber,
        lottery::Lottery,
        protocol::{
            frame,
            message::{Request, ACK, NOT_READY},
        },
        storage::{BetStore, FileBetStore, MemoryBetStore},
    };

    struct Running {
        addr: SocketAddr,
        shutdown: watch::Sender<bool>,
        handle: JoinHandle<()>,
    }

    impl Running {
        async fn stop(self) {
            self.shutdown.send(true).unwrap();
            self.handle.await.unwrap();
        }
    }

    fn start(agencies: usize, store: impl BetStore + 'static) -> Running {
        let lottery = Lottery::new(store, WinningNumber(7), agencies).shared();
        let server = Server::bind("127.0.0.1:0".parse().unwrap(), 16, lottery).unwrap();
        let addr = server.local_addr().unwrap();

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(server.run(rx));

        Running {
            addr,
            shutdown,
            handle,
        }
    }

    async fn request(addr: SocketAddr, message: &str) -> String {
        let mut conn = TcpStream::connect(addr).await.unwrap();
        frame::write_frame(&mut conn, message).await.unwrap();
        frame::read_frame(&mut conn).await.unwrap()
    }

    async fn send(addr: SocketAddr, message: &str) {
        let mut conn = TcpStream::connect(addr).await.unwrap();
        frame::write_frame(&mut conn, message).await.unwrap();

        // the server closes the connection without replying
        let result = frame::read_frame(&mut conn).await;
        assert!(matches!(
            result,
            Err(frame::FrameErr::UnexpectedEof { read: 0, .. })
        ));
    }

    fn bet(agency: usize, document: usize) -> Bet {
        Bet {
            agency: agency.to_string(),
            first_name: format!("Name{}", document),
            last_name: format!("Surname{}", document),
            document: format!("{}{:04}", agency, document),
            birthdate: "2000-02-29".into(),
            number: (document % 10).to_string(),
        }
    }

    #[tokio::test]
    async fn concurrent_batches_are_all_stored() {
        const AGENCIES: usize = 5;
        const BETS: usize = 100;
        const BATCH_SIZE: usize = 20;

        let file = TempFile::new().await.unwrap();
        let server = start(AGENCIES, FileBetStore::new(file.file_path().clone()));

        let mut agencies = JoinSet::new();
        for agency in 1..=AGENCIES {
            let addr = server.addr;
            agencies.spawn(async move {
                let bets: Vec<Bet> = (0..BETS).map(|document| bet(agency, document)).collect();
                for batch in bets.chunks(BATCH_SIZE) {
                    assert_eq!(request(addr, &codec::encode_batch(batch)).await, ACK);
                }
            });
        }
        while let Some(result) = agencies.join_next().await {
            result.unwrap();
        }

        let mut stored = FileBetStore::new(file.file_path().clone())
            .load_all()
            .await
            .unwrap();
        assert_eq!(stored.len(), AGENCIES * BETS);

        stored.sort_by(|a, b| a.document.cmp(&b.document));
        stored.dedup_by(|a, b| a.document == b.document);
        assert_eq!(stored.len(), AGENCIES * BETS);

        server.stop().await;
    }

    #[tokio::test]
    async fn full_lottery_round() {
        const AGENCIES: usize = 3;

        let server = start(AGENCIES, MemoryBetStore::default());
        let addr = server.addr;

        for agency in 1..=AGENCIES {
            let bets: Vec<Bet> = (0..30).map(|document| bet(agency, document)).collect();
            assert_eq!(request(addr, &codec::encode_batch(&bets)).await, ACK);
        }

        // queries before every agency finished are rejected
        send(addr, &Request::batch_end("1")).await;
        send(addr, &Request::batch_end("1")).await;
        assert_eq!(request(addr, &Request::get_winners("1")).await, NOT_READY);

        let mut finishing = JoinSet::new();
        for agency in 2..=AGENCIES {
            let message = Request::batch_end(&agency.to_string());
            finishing.spawn(async move { send(addr, &message).await });
        }
        while let Some(result) = finishing.join_next().await {
            result.unwrap();
        }

        for agency in 1..=AGENCIES {
            let reply = request(addr, &Request::get_winners(&agency.to_string())).await;
            let expected = format!("{0}0007;{0}0017;{0}0027", agency);
            assert_eq!(reply, expected);
        }
        assert_eq!(request(addr, &Request::get_winners("42")).await, "");

        server.stop().await;
    }

    #[tokio::test]
    async fn malformed_frame_only_affects_its_connection() {
        let server = start(1, MemoryBetStore::default());
        let addr = server.addr;

        // promises 100 bytes but only sends a few, then closes
        let mut broken = TcpStream::connect(addr).await.unwrap();
        broken.write_all(b"00000100BET_BATCH;agency:1").await.unwrap();

        let well_formed = tokio::spawn(async move {
            request(addr, &codec::encode_batch(&[bet(1, 7)])).await
        });

        drop(broken);
        assert_eq!(well_formed.await.unwrap(), ACK);

        // the server keeps serving new connections
        assert_eq!(request(addr, "PING").await, ACK);

        server.stop().await;
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_sessions() {
        let server = start(1, MemoryBetStore::default());
        let addr = server.addr;

        // a session that has only sent its header is still in flight
        let mut slow = TcpStream::connect(addr).await.unwrap();
        slow.write_all(b"00000003").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        server.shutdown.send(true).unwrap();
        tokio::time::sleep(ACCEPT_POLL_INTERVAL * 2).await;
        assert!(!server.handle.is_finished());

        slow.write_all(b"ABC").await.unwrap();
        assert_eq!(frame::read_frame(&mut slow).await.unwrap(), ACK);

        server.handle.await.unwrap();

        // the listening socket is gone
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
