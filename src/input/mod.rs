//! Player input events
//!
//! The player only cares about two things from the outside world: the user
//! asking to skip, and the output area changing size.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Stop playback now.
    Cancel,
    /// The output area is now `width x height`.
    Resize { width: u32, height: u32 },
}

/// Non-blocking source of [`PlayerEvent`]s.
pub trait EventSource {
    /// Next pending event, if any. Never blocks.
    fn poll(&mut self) -> Option<PlayerEvent>;
}

impl<E: EventSource + ?Sized> EventSource for Box<E> {
    fn poll(&mut self) -> Option<PlayerEvent> {
        (**self).poll()
    }
}

/// A source that never produces events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl EventSource for NoEvents {
    fn poll(&mut self) -> Option<PlayerEvent> {
        None
    }
}

/// Event source fed from other threads through an [`EventSender`].
#[derive(Debug)]
pub struct ChannelEvents {
    rx: Receiver<PlayerEvent>,
}

/// Cloneable handle for pushing events into a [`ChannelEvents`].
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<PlayerEvent>,
}

impl ChannelEvents {
    pub fn channel() -> (EventSender, ChannelEvents) {
        let (tx, rx) = channel::unbounded();
        (EventSender { tx }, ChannelEvents { rx })
    }
}

impl EventSource for ChannelEvents {
    fn poll(&mut self) -> Option<PlayerEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

impl EventSender {
    /// Queues an event. Returns `false` once the receiving side is gone.
    pub fn send(&self, event: PlayerEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn send_cancel(&self) -> bool {
        self.send(PlayerEvent::Cancel)
    }

    pub fn send_resize(&self, width: u32, height: u32) -> bool {
        self.send(PlayerEvent::Resize { width, height })
    }
}
