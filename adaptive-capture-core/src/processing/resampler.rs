use crate::models::error::CaptureError;

pub const MIN_RESAMPLE_RATE: u32 = 1_000;
pub const MAX_RESAMPLE_RATE: u32 = 768_000;

/// Streaming nearest-neighbor resampler for mono PCM16.
///
/// Zero-order hold with no anti-aliasing filter: cheap and lossy, good
/// enough for speech recognition input. The read position is kept as an
/// exact integer count of `1 / out_rate` input steps and carries across
/// calls, so splitting the input into chunks does not shift the output.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    in_rate: u32,
    out_rate: u32,
    /// Read position in input samples, scaled by `out_rate`.
    pos: u64,
}

impl StreamResampler {
    pub fn new(in_rate: u32, out_rate: u32) -> Result<Self, CaptureError> {
        for rate in [in_rate, out_rate] {
            if !(MIN_RESAMPLE_RATE..=MAX_RESAMPLE_RATE).contains(&rate) {
                return Err(CaptureError::ResamplerInit(format!(
                    "unsupported rate {} Hz for {} -> {} Hz",
                    rate, in_rate, out_rate
                )));
            }
        }
        Ok(Self {
            in_rate,
            out_rate,
            pos: 0,
        })
    }

    pub fn in_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn out_rate(&self) -> u32 {
        self.out_rate
    }

    /// Output samples a chunk of `input_len` can produce at most.
    pub fn max_output_len(&self, input_len: usize) -> usize {
        let scaled = input_len as u64 * self.out_rate as u64;
        scaled.div_ceil(self.in_rate as u64) as usize + 1
    }

    /// Resample one chunk into `output`, stopping early if it fills up.
    ///
    /// Returns the number of samples written.
    pub fn process_into(&mut self, input: &[i16], output: &mut [i16]) -> usize {
        let out_rate = self.out_rate as u64;
        let end = input.len() as u64 * out_rate;
        let mut written = 0;
        while self.pos < end && written < output.len() {
            output[written] = input[(self.pos / out_rate) as usize];
            written += 1;
            self.pos += self.in_rate as u64;
        }
        self.pos = self.pos.saturating_sub(end);
        written
    }

    /// Resample one chunk.
    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        let mut output = vec![0i16; self.max_output_len(input.len())];
        let written = self.process_into(input, &mut output);
        output.truncate(written);
        output
    }
}
