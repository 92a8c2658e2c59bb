//! Stateless pipes deliver every message, even if it is the same as the last one.
//!
//! Coordinators publish on a fixed schedule and subscribers expect to hear about every
//! tick, so no de-duplication happens here.

use tokio::{
    select,
    sync::{broadcast, mpsc, oneshot},
};
use tracing::{debug, error};

use super::{RecvError, PIPE_SIZE};
use crate::spawn;

enum SendMessage<T> {
    Set(T),
}

enum ReceiveMessage<T> {
    Subscribe(oneshot::Sender<broadcast::Receiver<T>>),
}

/// Create a stateless pipe that sends every message.
#[must_use]
pub fn create_pipe<T>(name: impl Into<String>) -> (Sender<T>, Receiver<T>)
where
    T: Clone + Send + 'static,
{
    let (send_tx, mut send_rx) = mpsc::channel::<SendMessage<T>>(PIPE_SIZE);
    let (receive_tx, mut receive_rx) = mpsc::channel::<ReceiveMessage<T>>(PIPE_SIZE);
    let (out_tx, out_rx) = broadcast::channel::<T>(PIPE_SIZE);

    drop(out_rx);

    let name = name.into();

    let sender = Sender {
        tx: send_tx,
        name: name.clone(),
    };
    let receiver = Receiver {
        tx: receive_tx,
        name: name.clone(),
    };

    spawn(async move {
        loop {
            select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(SendMessage::Set(data)) => {
                            // It is not an error if there are no subscribers.
                            let _ = out_tx.send(data);
                        }
                        None => {
                            debug!("stateless::create_pipe({name}): send channel closed");
                            break;
                        }
                    }
                }
                Some(msg) = receive_rx.recv() => {
                    match msg {
                        ReceiveMessage::Subscribe(tx) => {
                            if tx.send(out_tx.subscribe()).is_err() {
                                error!("stateless::create_pipe({name}): subscribe send failed");
                            }
                        }
                    }
                }
            }
        }
    });

    (sender, receiver)
}

/// Send a value to a pipe.
#[derive(Clone)]
pub struct Sender<T> {
    name: String,
    tx: mpsc::Sender<SendMessage<T>>,
}

impl<T> Sender<T> {
    /// Send data to the pipe or log an error if the buffer is full.
    pub fn try_send(&self, data: T) {
        let msg = SendMessage::Set(data);
        if let Err(err) = self.tx.try_send(msg) {
            error!("{}: send failed: {}", self.name, err);
        }
    }
}

/// Receive values from a pipe.
#[derive(Clone)]
pub struct Receiver<T> {
    name: String,
    tx: mpsc::Sender<ReceiveMessage<T>>,
}

impl<T> Receiver<T>
where
    T: Clone + Send + 'static,
{
    /// Subscribe to this pipe.
    ///
    /// Only messages sent after this returns are delivered. Returns an already closed
    /// subscription if the pipe is closed.
    pub async fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = oneshot::channel();
        if let Err(err) = self.tx.send(ReceiveMessage::Subscribe(tx)).await {
            error!("{}: subscribe/send failed: {}", self.name, err);
            return Subscription::null();
        }
        rx.await.map_or_else(
            |_| {
                error!("{}: subscribe/await failed", self.name);
                Subscription::null()
            },
            |rx| Subscription { rx },
        )
    }
}

/// A subscription to receive data from a pipe.
pub struct Subscription<T> {
    rx: broadcast::Receiver<T>,
}

impl<T> Subscription<T>
where
    T: Clone,
{
    fn null() -> Self {
        let (_tx, rx) = broadcast::channel(1);
        Self { rx }
    }

    /// Wait for the next value.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Closed` if the pipe is closed.
    pub async fn recv(&mut self) -> Result<T, RecvError> {
        loop {
            match self.rx.recv().await {
                Ok(v) => return Ok(v),
                Err(broadcast::error::RecvError::Closed) => return Err(RecvError::Closed),
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    error!("recv failed: The pipe was lagged");
                }
            }
        }
    }

    /// Get the next value but don't wait for it. Returns `None` if there is no value.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Closed` if the pipe is closed.
    pub fn try_recv(&mut self) -> Result<Option<T>, RecvError> {
        loop {
            match self.rx.try_recv() {
                Ok(v) => return Ok(Some(v)),
                Err(broadcast::error::TryRecvError::Closed) => return Err(RecvError::Closed),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    error!("try_recv failed: The pipe was lagged");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[tokio::test]
    async fn test_every_message_is_delivered() {
        let (tx, rx) = create_pipe::<u32>("test");
        let mut sub = rx.subscribe().await;

        tx.try_send(1);
        tx.try_send(1);
        tx.try_send(2);

        assert_eq!(sub.recv().await, Ok(1));
        assert_eq!(sub.recv().await, Ok(1));
        assert_eq!(sub.recv().await, Ok(2));
    }

    #[tokio::test]
    async fn test_closed_when_sender_dropped() {
        let (tx, rx) = create_pipe::<u32>("test");
        let mut sub = rx.subscribe().await;

        tx.try_send(7);
        drop(tx);

        assert_eq!(sub.recv().await, Ok(7));
        assert_eq!(sub.recv().await, Err(RecvError::Closed));
    }
}
