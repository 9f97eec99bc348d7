//! Fire-and-forget message relay between the observer and the presenter.
//!
//! A relay carries one message type over a plain `std::sync::mpsc` channel. It
//! promises at most one delivery and nothing else: messages sent after the
//! receiver went away are dropped, and callers must not rely on ordering
//! between two sends.

pub mod messages;

pub use messages::{Artwork, ControlAction, ControlCommand, IslandUpdate};

use std::fmt;
use std::sync::mpsc;
use std::sync::Arc;
use thiserror::Error;

/// A message that can travel over a relay.
pub trait Payload: Send + 'static {
    /// Channel name, used in logs.
    const CHANNEL: &'static str;

    /// Approximate encoded size in bytes, checked against the relay limit.
    fn payload_size(&self) -> usize;
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{channel}: payload of {size} bytes exceeds the {limit} byte limit")]
    Oversized {
        channel: &'static str,
        size: usize,
        limit: usize,
    },
}

/// A message the relay refused, handed back so the caller can degrade it.
pub struct Rejected<T> {
    pub error: RelayError,
    pub message: T,
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected").field("error", &self.error).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Nobody is listening; the message is gone.
    Dropped,
}

type Deliver<T> = dyn Fn(T) -> bool + Send + Sync;

pub struct RelaySender<T> {
    deliver: Arc<Deliver<T>>,
    limit: usize,
}

impl<T> Clone for RelaySender<T> {
    fn clone(&self) -> Self {
        Self {
            deliver: Arc::clone(&self.deliver),
            limit: self.limit,
        }
    }
}

impl<T: Payload> RelaySender<T> {
    pub fn send(&self, message: T) -> Result<Delivery, Rejected<T>> {
        let size = message.payload_size();
        if size > self.limit {
            return Err(Rejected {
                error: RelayError::Oversized {
                    channel: T::CHANNEL,
                    size,
                    limit: self.limit,
                },
                message,
            });
        }

        if (self.deliver)(message) {
            Ok(Delivery::Sent)
        } else {
            tracing::debug!("{}: receiver gone, message dropped", T::CHANNEL);
            Ok(Delivery::Dropped)
        }
    }
}

/// Relay whose receiving end consumes the payload type directly.
#[cfg(test)]
pub fn channel<T: Payload>(limit: usize) -> (RelaySender<T>, mpsc::Receiver<T>) {
    let (tx, rx) = mpsc::channel();
    (bridge(tx, std::convert::identity, limit), rx)
}

/// Relay that feeds into a component's wider input channel, wrapping each
/// payload with `wrap` on the way in.
pub fn bridge<T, E>(tx: mpsc::Sender<E>, wrap: fn(T) -> E, limit: usize) -> RelaySender<T>
where
    T: Payload,
    E: Send + 'static,
{
    RelaySender {
        deliver: Arc::new(move |message: T| tx.send(wrap(message)).is_ok()),
        limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_command_within_limit() {
        let (tx, rx) = channel::<ControlCommand>(64);
        let delivery = tx.send(ControlCommand::new(ControlAction::Next)).unwrap();

        assert_eq!(delivery, Delivery::Sent);
        assert_eq!(rx.try_recv().unwrap().action, ControlAction::Next);
    }

    #[test]
    fn rejects_oversized_payload_and_returns_it() {
        let (tx, rx) = channel::<IslandUpdate>(16);
        let update = IslandUpdate {
            title: "A title that is far too long".to_string(),
            text: String::new(),
            is_playing: false,
            artwork: None,
            package_name: "spotify".to_string(),
        };

        let rejected = tx.send(update).unwrap_err();
        assert!(matches!(rejected.error, RelayError::Oversized { limit: 16, .. }));
        assert_eq!(rejected.message.title, "A title that is far too long");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_after_receiver_dropped_is_not_an_error() {
        let (tx, rx) = channel::<ControlCommand>(64);
        drop(rx);

        let delivery = tx.send(ControlCommand::new(ControlAction::Prev)).unwrap();
        assert_eq!(delivery, Delivery::Dropped);
    }

    #[test]
    fn bridge_wraps_into_wider_input() {
        #[derive(Debug)]
        enum Input {
            Command(ControlCommand),
        }

        let (tx, rx) = mpsc::channel::<Input>();
        let relay = bridge(tx, Input::Command, 64);
        relay.send(ControlCommand::new(ControlAction::PlayPause)).unwrap();

        match rx.try_recv().unwrap() {
            Input::Command(command) => assert_eq!(command.action, ControlAction::PlayPause),
        }
    }
}
