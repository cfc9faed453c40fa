use heapless::Deque;

/// A fixed-capacity queue, backed by a ringbuffer.
///
/// This queue drops old messages if you try to send something while it is full.
pub struct RingQueue<T, const N: usize> {
    overflowed: bool,
    buf: Deque<T, N>,
}

/// The [RingQueue] overflowed since the last call to [RingQueue::recv].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Lagged;

impl<T, const N: usize> RingQueue<T, N> {
    pub const fn new() -> Self {
        Self {
            overflowed: false,
            buf: Deque::new(),
        }
    }

    /// Push a message onto the queue.
    ///
    /// If the queue is full, the oldest message will be dropped.
    pub fn send(&mut self, message: T) {
        if let Err(message) = self.buf.push_back(message) {
            let _ = self.buf.pop_front();
            self.buf.push_back(message).ok(/* we just made room */);
            self.overflowed = true;
        }
    }

    /// Take the oldest message, if any.
    ///
    /// Returns `Err(Lagged)` if the queue has overflowed since the last call to `recv`.
    /// Subsequent calls will return `Ok(T)` (assuming the queue didn't overflow again).
    pub fn recv(&mut self) -> Option<Result<T, Lagged>> {
        if self.overflowed {
            self.overflowed = false;
            Some(Err(Lagged))
        } else {
            self.buf.pop_front().map(Ok)
        }
    }

    /// Remove all messages that has not yet been received.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }
}
