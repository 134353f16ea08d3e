//! A lottery server: agencies stream their bets, and once every agency
//! has finished the server draws the winners and answers winner queries.

pub mod bet;
pub mod client;
pub mod codec;
pub mod config;
pub mod draw;
pub mod lottery;
pub mod protocol;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod storage;
