//! Balance notifications.
//!
//! `BalanceFeed` caches the last published balance and fans changes out over a broadcast
//! channel. A `BalanceStream` replays the cached value on subscription and suppresses
//! consecutive duplicates. A subscriber that falls behind skips the overwritten values and
//! carries on from the oldest retained one; lag is never surfaced as an error.

use futures::Stream;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

struct FeedInner {
	latest: RwLock<String>,
	sender: broadcast::Sender<String>,
}

/// Publisher side of the balance stream
#[derive(Clone)]
pub struct BalanceFeed {
	inner: Arc<FeedInner>,
}

impl BalanceFeed {
	pub fn new(initial: impl Into<String>) -> Self {
		let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
		Self {
			inner: Arc::new(FeedInner {
				latest: RwLock::new(initial.into()),
				sender,
			}),
		}
	}

	/// The most recently published balance.
	pub fn latest(&self) -> String {
		self.inner.latest.read().clone()
	}

	/// Publish `value` if it differs from the last published balance.
	///
	/// Returns whether subscribers were notified.
	pub fn publish(&self, value: String) -> bool {
		let mut latest = self.inner.latest.write();
		if *latest == value {
			return false;
		}
		*latest = value.clone();
		// No receivers is fine: late subscribers replay `latest`.
		let _ = self.inner.sender.send(value);
		true
	}

	pub fn subscribe(&self) -> BalanceStream {
		// Holding the read lock orders this subscription against concurrent publishes.
		let latest = self.inner.latest.read();
		BalanceStream {
			receiver: self.inner.sender.subscribe(),
			pending: Some(latest.clone()),
			last_emitted: None,
		}
	}
}

/// Subscriber side of the balance stream
pub struct BalanceStream {
	receiver: broadcast::Receiver<String>,
	pending: Option<String>,
	last_emitted: Option<String>,
}

impl BalanceStream {
	/// Wait for the next distinct balance.
	///
	/// Returns `None` once every publisher is gone and all buffered values were consumed.
	pub async fn next(&mut self) -> Option<String> {
		loop {
			let candidate = match self.pending.take() {
				Some(value) => value,
				None => match self.receiver.recv().await {
					Ok(value) => value,
					Err(RecvError::Lagged(skipped)) => {
						debug!("Balance subscriber lagged by {} updates", skipped);
						continue;
					}
					Err(RecvError::Closed) => return None,
				},
			};

			if self.last_emitted.as_deref() == Some(candidate.as_str()) {
				continue;
			}
			self.last_emitted = Some(candidate.clone());
			return Some(candidate);
		}
	}

	/// Adapt into a `futures::Stream`.
	pub fn into_stream(self) -> impl Stream<Item = String> + Send + 'static {
		futures::stream::unfold(self, |mut stream| async move {
			stream.next().await.map(|value| (value, stream))
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::StreamExt;

	#[tokio::test]
	async fn replays_latest_to_new_subscribers() {
		let feed = BalanceFeed::new("0");
		assert!(feed.publish("1.5".to_string()));

		let mut late = feed.subscribe();
		assert_eq!(late.next().await.as_deref(), Some("1.5"));

		feed.publish("2".to_string());
		assert_eq!(late.next().await.as_deref(), Some("2"));
	}

	#[tokio::test]
	async fn suppresses_consecutive_duplicates() {
		let feed = BalanceFeed::new("0");
		let mut stream = feed.subscribe();

		assert!(!feed.publish("0".to_string()));
		assert!(feed.publish("3".to_string()));
		assert!(!feed.publish("3".to_string()));
		assert!(feed.publish("4".to_string()));
		drop(feed);

		let values: Vec<String> = {
			let mut values = Vec::new();
			while let Some(value) = stream.next().await {
				values.push(value);
			}
			values
		};
		assert_eq!(values, vec!["0", "3", "4"]);
	}

	#[tokio::test]
	async fn lagging_subscriber_catches_up_in_order() {
		let feed = BalanceFeed::new("0");
		let mut stream = feed.subscribe();
		assert_eq!(stream.next().await.as_deref(), Some("0"));

		let published = CHANNEL_CAPACITY as u64 * 2;
		for i in 1..=published {
			feed.publish(i.to_string());
		}
		drop(feed);

		let mut received = Vec::new();
		while let Some(value) = stream.next().await {
			received.push(value.parse::<u64>().unwrap());
		}
		assert!(received.len() <= CHANNEL_CAPACITY);
		assert!(received.windows(2).all(|pair| pair[0] < pair[1]));
		assert_eq!(received.last(), Some(&published));
	}

	#[tokio::test]
	async fn adapts_into_futures_stream() {
		let feed = BalanceFeed::new("7");
		let stream = feed.subscribe().into_stream();
		feed.publish("8".to_string());
		drop(feed);

		let values: Vec<String> = stream.collect().await;
		assert_eq!(values, vec!["7", "8"]);
	}
}
