//! Simple stateless pub-sub event handler
//!
//! This module provides a simple hook system that allows components of the system to subscribe to dispatch events and
//! react to them. The event handler is stateless, i.e. the handlers have no access to the internal state of the
//! system. All that is received is the event itself.
//!
//! Handlers can be async. Events are handled one at a time, in the order they were received, so a subscriber never
//! sees an acceptance before the offer that preceded it.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // drop the internal sender so that when the last subscriber is dropped, we can automatically shut down the
        // handler
        drop(self.sender);
        let mut handled = 0u64;
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling event");
            (self.handler)(ev).await;
            handled += 1;
        }
        debug!("📬️ Event handler has shut down after {handled} events");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }

    /// Queues the event without waiting for room. Returns `false` if the event was dropped.
    pub fn try_publish_event(&self, event: E) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("📬️ Event queue is full. The event was dropped.");
                false
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("📬️ Failed to send event: the handler has shut down");
                false
            },
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;

    #[tokio::test]
    async fn events_are_handled_in_order() {
        let _ = env_logger::try_init();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s2 = seen.clone();
        let handler: Handler<u64> = Arc::new(move |v: u64| {
            let seen = seen.clone();
            Box::pin(async move {
                // Earlier events sleep longer. Out-of-order handling would show up as a shuffled list.
                tokio::time::sleep(tokio::time::Duration::from_millis(10 * (5 - v.min(5)))).await;
                seen.lock().unwrap().push(v);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(2, handler);
        let producer = event_handler.subscribe();
        tokio::spawn(async move {
            for v in 0..5 {
                producer.publish_event(v).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(*s2.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn handler_stops_when_producers_drop() {
        let count = Arc::new(Mutex::new(0u64));
        let c2 = count.clone();
        let handler: Handler<u64> = Arc::new(move |v: u64| {
            let count = count.clone();
            Box::pin(async move {
                *count.lock().unwrap() += v;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(1, handler);
        let p1 = event_handler.subscribe();
        let p2 = event_handler.subscribe();
        tokio::spawn(async move {
            for i in 0..5 {
                p1.publish_event(i * 2 + 1).await;
            }
        });
        tokio::spawn(async move {
            for i in 0..5 {
                p2.publish_event(i * 2).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(*c2.lock().unwrap(), 45);
    }

    #[tokio::test]
    async fn try_publish_drops_when_full() {
        let handler: Handler<u64> = Arc::new(|_: u64| Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>);
        let event_handler = EventHandler::new(1, handler);
        let producer = event_handler.subscribe();
        assert!(producer.try_publish_event(1));
        assert!(!producer.try_publish_event(2));
        drop(event_handler);
        assert!(!producer.try_publish_event(3));
    }
}
