use std::sync::{Mutex, PoisonError};

use super::format::WaveFormat;

/// A producer of interleaved sample bytes, pulled on demand.
///
/// `read` fills as much of `buffer` as it can and returns the number of bytes
/// written. Fewer bytes than `buffer.len()` (including zero) signal end of
/// stream.
pub trait SampleSource: Send {
    fn read(&mut self, buffer: &mut [u8]) -> usize;

    fn format(&self) -> WaveFormat;
}

/// A pull source that can be read through a shared reference, which is what a
/// render pipeline's pump thread holds.
pub trait SharedSampleSource: Send + Sync {
    fn read(&self, buffer: &mut [u8]) -> usize;

    fn format(&self) -> WaveFormat;
}

impl<S: SampleSource> SharedSampleSource for Mutex<S> {
    fn read(&self, buffer: &mut [u8]) -> usize {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read(buffer)
    }

    fn format(&self) -> WaveFormat {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .format()
    }
}
