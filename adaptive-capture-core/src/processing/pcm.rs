//! 16-bit PCM byte/sample conversion and channel downmix.

/// Decode little-endian 16-bit samples. A trailing odd byte is ignored.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode samples as little-endian 16-bit PCM.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    data
}

/// Downmix interleaved multi-channel audio to mono by averaging each frame.
///
/// Integer average, truncated toward zero. A trailing partial frame is dropped.
pub fn downmix_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}
