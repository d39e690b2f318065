use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Inner {
    samples: VecDeque<i16>,
    closed: bool,
}

/// Bounded sample FIFO between a blocking writer and the device callback.
///
/// The writer blocks while the buffer is full; the callback never blocks.
#[derive(Debug)]
pub struct LineBuffer {
    inner: Mutex<Inner>,
    space_available: Condvar,
    drained: Condvar,
    capacity: usize,
    channels: u16,
    sample_rate: u32,
}

impl LineBuffer {
    /// Create a new buffer holding at most `capacity` samples
    pub fn new(capacity: usize, channels: u16, sample_rate: u32) -> Self {
        let capacity = capacity.max(channels.max(1) as usize);
        Self {
            inner: Mutex::new(Inner {
                samples: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            space_available: Condvar::new(),
            drained: Condvar::new(),
            capacity,
            channels,
            sample_rate,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the total capacity in samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of samples available for reading
    pub fn available_read(&self) -> usize {
        self.lock().samples.len()
    }

    /// Get the number of samples that can be written without blocking
    pub fn available_write(&self) -> usize {
        self.capacity - self.available_read()
    }

    pub fn is_empty(&self) -> bool {
        self.available_read() == 0
    }

    /// Fill level between 0.0 and 1.0
    pub fn fill_level(&self) -> f32 {
        self.available_read() as f32 / self.capacity as f32
    }

    /// Playback time of the samples still queued
    pub fn buffered_duration(&self) -> Duration {
        let frames = self.available_read() / self.channels.max(1) as usize;
        Duration::from_secs_f64(frames as f64 / self.sample_rate.max(1) as f64)
    }

    /// Queue samples, blocking until there is room for at least one.
    /// Returns the number of samples taken, 0 once the buffer is closed.
    pub fn write(&self, data: &[i16]) -> usize {
        if data.is_empty() {
            return 0;
        }

        let mut inner = self.lock();
        while !inner.closed && inner.samples.len() >= self.capacity {
            inner = self
                .space_available
                .wait(inner)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        if inner.closed {
            return 0;
        }

        let to_write = data.len().min(self.capacity - inner.samples.len());
        inner.samples.extend(&data[..to_write]);
        to_write
    }

    /// Take queued samples for the device. Never blocks on the writer.
    /// Returns the number of samples copied into `out`.
    pub fn read(&self, out: &mut [i16]) -> usize {
        let mut inner = self.lock();
        let to_read = out.len().min(inner.samples.len());
        for (slot, sample) in out.iter_mut().zip(inner.samples.drain(..to_read)) {
            *slot = sample;
        }

        if to_read > 0 {
            self.space_available.notify_all();
        }
        if inner.samples.is_empty() {
            self.drained.notify_all();
        }
        to_read
    }

    /// Wait until every queued sample has been read, or the timeout passes.
    /// Returns true when the buffer emptied.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        while !inner.closed && !inner.samples.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .drained
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            inner = guard;
        }
        inner.samples.is_empty()
    }

    /// Drop queued samples and wake any blocked writer
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.samples.clear();
        self.space_available.notify_all();
        self.drained.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_write_and_read() {
        let buffer = LineBuffer::new(8, 2, 44100);
        assert_eq!(buffer.write(&[1, 2, 3, 4]), 4);
        assert_eq!(buffer.available_read(), 4);
        assert_eq!(buffer.available_write(), 4);

        let mut out = [0i16; 3];
        assert_eq!(buffer.read(&mut out), 3);
        assert_eq!(out, [1, 2, 3]);
        assert_eq!(buffer.available_read(), 1);
    }

    #[test]
    fn test_write_is_bounded_by_capacity() {
        let buffer = LineBuffer::new(4, 2, 44100);
        assert_eq!(buffer.write(&[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(buffer.fill_level(), 1.0);
    }

    #[test]
    fn test_full_buffer_blocks_writer_until_read() {
        let buffer = Arc::new(LineBuffer::new(4, 1, 44100));
        assert_eq!(buffer.write(&[0; 4]), 4);

        let writer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.write(&[9, 9]))
        };

        thread::sleep(Duration::from_millis(20));
        let mut out = [0i16; 2];
        assert_eq!(buffer.read(&mut out), 2);

        assert_eq!(writer.join().unwrap(), 2);
        assert_eq!(buffer.available_read(), 4);
    }

    #[test]
    fn test_close_releases_blocked_writer() {
        let buffer = Arc::new(LineBuffer::new(2, 1, 44100));
        buffer.write(&[0, 0]);

        let writer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.write(&[1]))
        };

        thread::sleep(Duration::from_millis(20));
        buffer.close();
        assert_eq!(writer.join().unwrap(), 0);
        assert!(buffer.is_closed());
    }

    #[test]
    fn test_wait_drained() {
        let buffer = Arc::new(LineBuffer::new(16, 2, 44100));
        buffer.write(&[5; 10]);
        assert!(!buffer.wait_drained(Duration::from_millis(10)));

        let reader = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut out = [0i16; 4];
                while buffer.read(&mut out) > 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        assert!(buffer.wait_drained(Duration::from_secs(2)));
        reader.join().unwrap();
    }

    #[test]
    fn test_buffered_duration() {
        let buffer = LineBuffer::new(100_000, 2, 44100);
        buffer.write(&vec![0; 88_200]);
        assert_eq!(buffer.buffered_duration(), Duration::from_secs(1));
    }
}
