//! In-process message bus.
//!
//! Decouples message arrival (transport reader task) from the reactions to
//! it. The bus carries the closed [`Message`] union on a single broadcast
//! channel so arrival order is preserved across variants; typed
//! subscriptions select their variant at compile time through [`Topic`].
//!
//! The bus has no memory: a subscriber only sees messages published after it
//! subscribed. Publishing never blocks and is safe from any thread.
//!
//! Delivery is at most once. A subscriber that falls more than `capacity`
//! messages behind loses the oldest ones; it keeps a count of them
//! ([`Subscription::take_skipped`]) so the consumer can re-derive whatever
//! state those messages would have carried.

use sync_types::{ArticleMessage, ChannelActive, EmptyArticleMessage, Message, WordCountMessage};
use tokio::sync::broadcast;

/// A payload type that can be subscribed to.
pub trait Topic: Sized + Send + 'static {
    /// Extract this topic's payload, or `None` for other variants.
    fn from_message(message: Message) -> Option<Self>;
}

impl Topic for Message {
    fn from_message(message: Message) -> Option<Self> {
        Some(message)
    }
}

impl Topic for ChannelActive {
    fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::ChannelActive(m) => Some(m),
            _ => None,
        }
    }
}

impl Topic for ArticleMessage {
    fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Article(m) => Some(m),
            _ => None,
        }
    }
}

impl Topic for WordCountMessage {
    fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::WordCount(m) => Some(m),
            _ => None,
        }
    }
}

impl Topic for EmptyArticleMessage {
    fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::EmptyArticle(m) => Some(m),
            _ => None,
        }
    }
}

/// Cloneable handle to the bus.
#[derive(Debug, Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<Message>,
}

impl MessageBus {
    /// Create a bus; `capacity` messages may be buffered per slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a message to current subscribers.
    ///
    /// Returns the number of subscribers that will see it.
    pub fn publish(&self, message: impl Into<Message>) -> usize {
        let message = message.into();
        let kind = message.kind();
        match self.sender.send(message) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!("No subscribers for {} message", kind);
                0
            }
        }
    }

    /// Subscribe to one topic.
    pub fn subscribe<T: Topic>(&self) -> Subscription<T> {
        Subscription {
            receiver: self.sender.subscribe(),
            skipped: 0,
            _topic: std::marker::PhantomData,
        }
    }

    /// Current number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A typed stream of one topic's payloads.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: broadcast::Receiver<Message>,
    skipped: u64,
    _topic: std::marker::PhantomData<fn() -> T>,
}

impl<T: Topic> Subscription<T> {
    /// Wait for the next payload. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => {
                    if let Some(payload) = T::from_message(message) {
                        return Some(payload);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Bus subscriber lagged, skipped {} messages", skipped);
                    self.skipped += skipped;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next already-published payload without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => {
                    if let Some(payload) = T::from_message(message) {
                        return Some(payload);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Bus subscriber lagged, skipped {} messages", skipped);
                    self.skipped += skipped;
                }
                Err(_) => return None,
            }
        }
    }

    /// Number of messages lost to lag since the last call.
    pub fn take_skipped(&mut self) -> u64 {
        std::mem::take(&mut self.skipped)
    }
}
