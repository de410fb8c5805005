/// Upper bound on the number of timing slots kept for one reply.
pub const MAX_SAMPLES: usize = 40;

/// Elapsed time and inclusive byte range for one segment of a reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSample {
    pub elapsed_ms: u64,
    pub first_byte: u64,
    pub last_byte: u64,
}

/// Splits a streamed reply into per-chunk timing slots.
///
/// Each chunk opens a new slot until [`MAX_SAMPLES`] slots exist. After that
/// the last slot turns into an overflow bucket: its byte range is extended and
/// its time keeps accruing for every further chunk, so it may stand for an
/// arbitrarily large tail of the transfer.
#[derive(Debug, Clone)]
pub struct TimeSampler {
    samples: Vec<TimeSample>,
    mark_ms: u64,
}

impl TimeSampler {
    pub fn new(start_ms: u64) -> Self {
        Self {
            samples: Vec::with_capacity(MAX_SAMPLES),
            mark_ms: start_ms,
        }
    }

    /// Account for a chunk of `len` bytes starting at `offset`, completed at `now_ms`.
    /// Returns the slot the chunk opened, or `None` when it was folded into the overflow bucket.
    pub fn record(&mut self, offset: u64, len: u64, now_ms: u64) -> Option<&TimeSample> {
        let elapsed = now_ms.saturating_sub(self.mark_ms);
        self.mark_ms = now_ms;
        let last_byte = (offset + len).saturating_sub(1);

        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(TimeSample {
                elapsed_ms: elapsed,
                first_byte: offset,
                last_byte,
            });
            return self.samples.last();
        }

        if let Some(bucket) = self.samples.last_mut() {
            bucket.elapsed_ms += elapsed;
            bucket.last_byte = last_byte;
        }
        None
    }

    pub fn into_samples(self) -> Vec<TimeSample> {
        self.samples
    }
}
