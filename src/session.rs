use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    lottery::{Completion, SharedLottery},
    protocol::{
        frame::{self, FrameErr},
        message::{Request, Response},
    },
    storage::StorageErr,
};

#[derive(thiserror::Error, Debug)]
pub enum SessionErr {
    #[error("{0}")]
    Frame(#[from] FrameErr),

    #[error("{0}")]
    Storage(#[from] StorageErr),
}

/// Serves a single message on the stream.
///
/// the caller is expected to close the connection afterwards,
/// a session never handles more than one message.
pub async fn handle<S>(stream: &mut S, lottery: &SharedLottery) -> Result<(), SessionErr>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let payload = frame::read_frame(stream).await?;
    tracing::debug!(len = payload.len(), "received message");

    let request = match payload.parse::<Request>() {
        Ok(request) => request,
        Err(never) => match never {},
    };

    if let Some(response) = respond(request, lottery).await? {
        tracing::debug!("responded: {:?}", response);
        frame::write_frame(stream, &response.to_string()).await?;
    }

    Ok(())
}

// returns None when the request expects no response at all
async fn respond(
    request: Request,
    lottery: &SharedLottery,
) -> Result<Option<Response>, StorageErr> {
    let response = match request {
        Request::GetWinners { agency } => match lottery.lock().await.winners(&agency) {
            Some(winners) => {
                tracing::info!(
                    agency = %agency,
                    count = winners.len(),
                    "action: get_winners | result: success"
                );
                Response::Winners(winners)
            }
            None => {
                tracing::info!(agency = %agency, "action: get_winners | result: not_ready");
                Response::NotReady
            }
        },
        Request::BetBatch { bets } => {
            let count = bets.len();
            lottery.lock().await.store_bets(bets).await?;
            tracing::info!(count, "action: batch_received | result: success");

            Response::Ack
        }
        Request::BatchEnd { agency } => {
            let completion = lottery.lock().await.finish_agency(agency.clone()).await?;
            match completion {
                Completion::Recorded { remaining } => {
                    tracing::info!(
                        agency = %agency,
                        remaining,
                        "action: batch_end | result: success"
                    )
                }
                Completion::AlreadyRecorded => {
                    tracing::debug!(
                        agency = %agency,
                        "action: batch_end | result: already_recorded"
                    )
                }
                Completion::Drawn { winners } => {
                    tracing::info!(agency = %agency, "action: batch_end | result: success");
                    tracing::info!(winners, "action: draw | result: success");
                }
            }

            return Ok(None);
        }
        Request::Other(text) => {
            tracing::debug!("received an unknown message: {:?}", text);
            Response::Ack
        }
    };

    Ok(Some(response))
}
