//! First-responder race across several connections.

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;

use super::exchange::PendingExchange;
use crate::codec::{self, Message};
use crate::error::BusError;
use crate::transport::Connection;

/// Sends `message` to every connection and resolves with the first reply.
///
/// Each connection runs its own exchange in a spawned task. When one
/// resolves, the others are detached rather than cancelled: they keep
/// running until their own reply, error or close, and their outcome is
/// discarded.
///
/// # Errors
///
/// Returns [`BusError::Codec`] if the message cannot be encoded, and
/// [`BusError::Aggregate`] holding every exchange error, in connection
/// order, when none resolves. An empty connection set yields an empty
/// aggregate.
pub async fn broadcast_and_await_first<'a, I>(
    connections: I,
    message: &Message,
) -> Result<Message, BusError>
where
    I: IntoIterator<Item = &'a Connection>,
{
    let frame = codec::encode(message)?;
    let mut exchanges = FuturesUnordered::new();

    for (index, connection) in connections.into_iter().enumerate() {
        let connection = connection.clone();
        let id = message.id.clone();
        let frame = frame.clone();
        let handle = tokio::spawn(async move {
            PendingExchange::start(&connection, id, frame)?.wait().await
        });
        exchanges.push(async move { (index, handle.await) });
    }

    let mut failures: Vec<Option<BusError>> = Vec::new();
    failures.resize_with(exchanges.len(), || None);

    while let Some((index, joined)) = exchanges.next().await {
        match joined.unwrap_or_else(|e| Err(BusError::transport(e))) {
            Ok(reply) => {
                tracing::debug!(id = %message.id, pending = exchanges.len(), "first reply received");
                return Ok(reply);
            }
            Err(e) => {
                if let Some(slot) = failures.get_mut(index) {
                    *slot = Some(e);
                }
            }
        }
    }

    let errors: Vec<BusError> = failures.into_iter().flatten().collect();
    tracing::debug!(id = %message.id, failed = errors.len(), "no connection replied");
    Err(BusError::Aggregate(errors))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transport::memory;

    #[tokio::test]
    async fn one_reply_wins_over_closes() {
        let (conns, mut peers): (Vec<_>, Vec<_>) = (0..3).map(|_| memory::pair()).unzip();
        let request = Message::new(100_i64, json!({"q": "who"}));

        let Some(mut winner) = peers.pop() else {
            panic!("three peers");
        };
        let responders = tokio::spawn(async move {
            for peer in &mut peers {
                let _ = peer.next_message().await;
                peer.close(1000, "no answer");
            }
            let Some(Ok(req)) = winner.next_message().await else {
                panic!("winner should receive the request");
            };
            let _ = winner.deliver(&req.reply(json!("me")));
        });

        let Ok(reply) = broadcast_and_await_first(&conns, &request).await else {
            panic!("race should resolve");
        };
        assert_eq!(reply.payload, json!("me"));
        let _ = responders.await;
    }

    #[tokio::test]
    async fn all_closed_is_aggregate_of_closes() {
        let (conns, mut peers): (Vec<_>, Vec<_>) = (0..4).map(|_| memory::pair()).unzip();
        let request = Message::new("all-close", json!(null));

        let closer = tokio::spawn(async move {
            for (i, peer) in peers.iter_mut().enumerate() {
                let _ = peer.next_message().await;
                peer.close(1000 + u16::try_from(i).unwrap_or_default(), "bye");
            }
        });

        let Err(err) = broadcast_and_await_first(&conns, &request).await else {
            panic!("race should fail");
        };
        let _ = closer.await;

        let errors = err.aggregated();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().all(BusError::is_connection_closed));
        let codes: Vec<u16> = errors
            .iter()
            .filter_map(|e| match e {
                BusError::ConnectionClosed { code, .. } => Some(*code),
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec![1000, 1001, 1002, 1003]);
    }

    #[tokio::test]
    async fn empty_set_is_empty_aggregate() {
        let none: Vec<Connection> = Vec::new();
        let result = broadcast_and_await_first(&none, &Message::new(1_i64, json!(null))).await;
        let Err(BusError::Aggregate(errors)) = result else {
            panic!("expected an empty aggregate");
        };
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn losers_keep_running_until_settled() {
        let (fast, mut fast_peer) = memory::pair();
        let (slow, mut slow_peer) = memory::pair();
        let request = Message::new("race", json!(null));

        let fast_responder = tokio::spawn(async move {
            let Some(Ok(req)) = fast_peer.next_message().await else {
                panic!("fast peer should receive the request");
            };
            let _ = fast_peer.deliver(&req.reply(json!("fast")));
            fast_peer
        });

        let Ok(reply) = broadcast_and_await_first([&fast, &slow], &request).await else {
            panic!("race should resolve");
        };
        assert_eq!(reply.payload, json!("fast"));
        let _ = fast_responder.await;

        // The slow exchange is still registered on its connection.
        assert!(slow_peer.next_message().await.is_some());
        assert_eq!(slow.listener_count(), 1);

        let Ok(delivered) = slow_peer.deliver(&request.reply(json!("slow"))) else {
            panic!("encode");
        };
        assert_eq!(delivered, 1);
        for _ in 0..100 {
            if slow.listener_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(slow.listener_count(), 0);
    }
}
