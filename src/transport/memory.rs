//! In-process transport pair.

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

use super::{Transport, WireFrame};
use crate::error::{HcError, Result};

/// One end of an in-process connection.
///
/// Frames sent on one end are queued for the other. `recv` never blocks: an
/// empty queue reads as end of stream, which lets a single thread play both
/// sides of a conversation.
pub struct MemoryTransport {
    tx: Sender<WireFrame>,
    rx: Receiver<WireFrame>,
    connected: bool,
    fail_sends: bool,
    sent: usize,
}

impl MemoryTransport {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = channel();
        let (b_tx, a_rx) = channel();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(tx: Sender<WireFrame>, rx: Receiver<WireFrame>) -> Self {
        Self {
            tx,
            rx,
            connected: false,
            fail_sends: false,
            sent: 0,
        }
    }

    /// Make every following `send` fail until switched off again.
    pub fn set_fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }

    /// Number of frames delivered to the peer.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Check if `connect` was called and `close` was not
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn send(&mut self, frame: WireFrame) -> Result<()> {
        if !self.connected {
            return Err(HcError::Transport("not connected".to_string()));
        }
        if self.fail_sends {
            return Err(HcError::Transport("injected send failure".to_string()));
        }
        self.tx
            .send(frame)
            .map_err(|_| HcError::Transport("peer hung up".to_string()))?;
        self.sent += 1;
        Ok(())
    }

    fn recv(&mut self) -> Result<Option<WireFrame>> {
        if !self.connected {
            return Err(HcError::Transport("not connected".to_string()));
        }
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Ok(None),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_delivers_in_order() {
        let (mut a, mut b) = MemoryTransport::pair();
        a.connect().unwrap();
        b.connect().unwrap();

        a.send(WireFrame::Text("one".into())).unwrap();
        a.send(WireFrame::Binary(vec![2])).unwrap();

        assert_eq!(b.recv().unwrap(), Some(WireFrame::Text("one".into())));
        assert_eq!(b.recv().unwrap(), Some(WireFrame::Binary(vec![2])));
        assert_eq!(b.recv().unwrap(), None);
        assert_eq!(a.sent(), 2);
    }

    #[test]
    fn test_injected_failure() {
        let (mut a, mut b) = MemoryTransport::pair();
        a.connect().unwrap();
        b.connect().unwrap();

        a.set_fail_sends(true);
        assert!(matches!(
            a.send(WireFrame::Text("x".into())),
            Err(HcError::Transport(_))
        ));
        assert_eq!(b.recv().unwrap(), None);

        a.set_fail_sends(false);
        a.send(WireFrame::Text("y".into())).unwrap();
        assert_eq!(b.recv().unwrap(), Some(WireFrame::Text("y".into())));
    }

    #[test]
    fn test_requires_connect() {
        let (mut a, _b) = MemoryTransport::pair();
        assert!(a.send(WireFrame::Text("x".into())).is_err());
        assert!(a.recv().is_err());
    }

    #[test]
    fn test_peer_dropped() {
        let (mut a, b) = MemoryTransport::pair();
        a.connect().unwrap();
        drop(b);
        assert!(a.send(WireFrame::Text("x".into())).is_err());
        assert_eq!(a.recv().unwrap(), None);
    }
}
