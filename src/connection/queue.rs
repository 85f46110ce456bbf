//! Thread-safe queue of encoded outbound frames.
//!
//! Hosts push under the send mutex from any thread; the worker pops one
//! frame at a time and performs the socket write only after the lock is
//! released, so enqueueing is never blocked by I/O latency. The
//! `connected` snapshot lives under the same mutex.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::connection::fragmenter::Fragmenter;
use crate::protocol::{Frame, MaskKeySource, OpCode};

struct Inner {
    frames: VecDeque<Vec<u8>>,
    mask_source: MaskKeySource,
    fragment_size: usize,
    connected: bool,
    closed: bool,
}

/// FIFO of fully-encoded, already-masked frames.
pub(crate) struct SendQueue {
    inner: Mutex<Inner>,
}

impl SendQueue {
    pub(crate) fn new(fragment_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::new(),
                mask_source: MaskKeySource::new(),
                fragment_size: fragment_size.max(1),
                connected: false,
                closed: false,
            }),
        }
    }

    pub(crate) fn set_fragment_size(&self, size: usize) {
        self.inner.lock().fragment_size = size.max(1);
    }

    /// Fragment, mask, and enqueue an outgoing message.
    ///
    /// Accepted before the connection opens (frames are flushed once it
    /// does); rejected after the terminal close.
    pub(crate) fn push_message(&self, opcode: OpCode, payload: &[u8]) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        let chunk_size = inner.fragment_size;
        for frame in Fragmenter::new(payload, opcode, chunk_size) {
            let key = inner.mask_source.next_key();
            let encoded = frame.encode(Some(key));
            inner.frames.push_back(encoded);
        }
        true
    }

    /// Mask and enqueue a single prebuilt frame (pong, close).
    pub(crate) fn push_frame(&self, frame: &Frame) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        let key = inner.mask_source.next_key();
        let encoded = frame.encode(Some(key));
        inner.frames.push_back(encoded);
        true
    }

    /// Dequeue the oldest frame. Worker-only.
    pub(crate) fn pop_front(&self) -> Option<Vec<u8>> {
        self.inner.lock().frames.pop_front()
    }

    /// Drop every queued frame.
    pub(crate) fn clear(&self) {
        self.inner.lock().frames.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.inner.lock().connected = connected;
    }

    /// Enter the terminal state: no further pushes, queue discarded.
    pub(crate) fn mark_closed(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.connected = false;
        inner.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Frame;

    #[test]
    fn test_fifo_order() {
        let queue = SendQueue::new(1024);
        assert!(queue.push_message(OpCode::Text, b"first"));
        assert!(queue.push_message(OpCode::Text, b"second"));

        let a = queue.pop_front().unwrap();
        let b = queue.pop_front().unwrap();
        assert!(queue.pop_front().is_none());

        let (frame_a, _) = Frame::parse(&a).unwrap().unwrap();
        let (frame_b, _) = Frame::parse(&b).unwrap().unwrap();
        assert_eq!(frame_a.payload(), b"first");
        assert_eq!(frame_b.payload(), b"second");
    }

    #[test]
    fn test_queued_frames_are_masked() {
        let queue = SendQueue::new(1024);
        queue.push_message(OpCode::Binary, &[1, 2, 3]);

        let wire = queue.pop_front().unwrap();
        assert_ne!(wire[1] & 0x80, 0, "mask bit must be set");

        let (frame, _) = Frame::parse(&wire).unwrap().unwrap();
        assert_eq!(frame.payload(), &[1, 2, 3]);
    }

    #[test]
    fn test_large_message_fragments() {
        let queue = SendQueue::new(10);
        let payload = vec![0x5a; 35];
        queue.push_message(OpCode::Binary, &payload);
        assert_eq!(queue.len(), 4);

        let mut rebuilt = Vec::new();
        let mut finals = 0;
        while let Some(wire) = queue.pop_front() {
            let (frame, _) = Frame::parse(&wire).unwrap().unwrap();
            rebuilt.extend_from_slice(frame.payload());
            if frame.fin {
                finals += 1;
            }
        }
        assert_eq!(rebuilt, payload);
        assert_eq!(finals, 1);
    }

    #[test]
    fn test_push_accepted_before_open() {
        let queue = SendQueue::new(1024);
        assert!(!queue.is_connected());
        assert!(queue.push_message(OpCode::Text, b"early"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_push_rejected_after_close() {
        let queue = SendQueue::new(1024);
        queue.push_message(OpCode::Text, b"queued");
        queue.mark_closed();

        assert_eq!(queue.len(), 0);
        assert!(!queue.push_message(OpCode::Text, b"late"));
        assert!(!queue.push_frame(&Frame::pong(b"late".to_vec())));
        assert!(!queue.is_connected());
    }

    #[test]
    fn test_clear_drops_frames() {
        let queue = SendQueue::new(1024);
        queue.push_message(OpCode::Text, b"a");
        queue.push_message(OpCode::Text, b"b");
        queue.clear();
        assert_eq!(queue.len(), 0);
        // Not terminal: new pushes still land.
        assert!(queue.push_message(OpCode::Text, b"c"));
    }

    #[test]
    fn test_connected_flag() {
        let queue = SendQueue::new(1024);
        queue.set_connected(true);
        assert!(queue.is_connected());
        queue.set_connected(false);
        assert!(!queue.is_connected());
    }

    #[test]
    fn test_per_frame_masks_differ() {
        let queue = SendQueue::new(1024);
        queue.push_message(OpCode::Text, b"same");
        queue.push_message(OpCode::Text, b"same");

        let a = queue.pop_front().unwrap();
        let b = queue.pop_front().unwrap();
        assert_ne!(a[2..6], b[2..6], "masking keys must vary across frames");
    }
}
