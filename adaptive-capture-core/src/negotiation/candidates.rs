use crate::models::audio_models::{AudioSourceKind, SourcePreference};

/// Microphone sources in the order they are tried.
pub const SOURCE_PRIORITY: [AudioSourceKind; 5] = [
    AudioSourceKind::VoiceCommunication,
    AudioSourceKind::Mic,
    AudioSourceKind::Camcorder,
    AudioSourceKind::Unprocessed,
    AudioSourceKind::VoiceRecognition,
];

/// Preferred device rates when nothing better is known. The requested rate
/// is slotted in after the two common hardware rates.
const PREFERRED_HIGH_RATES: [u32; 2] = [48_000, 44_100];
const PREFERRED_LOW_RATES: [u32; 2] = [16_000, 8_000];

fn push_unique<T: PartialEq + Copy>(list: &mut Vec<T>, value: T) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// 48000, 44100, requested, 16000, 8000 without duplicates.
pub fn default_rates(requested_rate: u32) -> Vec<u32> {
    let mut rates = Vec::with_capacity(5);
    for rate in PREFERRED_HIGH_RATES {
        push_unique(&mut rates, rate);
    }
    if requested_rate > 0 {
        push_unique(&mut rates, requested_rate);
    }
    for rate in PREFERRED_LOW_RATES {
        push_unique(&mut rates, rate);
    }
    rates
}

/// Device-advertised rates first, then the default list as fallback.
pub fn spliced_rates(device_rates: &[u32], requested_rate: u32) -> Vec<u32> {
    let mut rates = Vec::new();
    for &rate in device_rates.iter().filter(|&&r| r > 0) {
        push_unique(&mut rates, rate);
    }
    for rate in default_rates(requested_rate) {
        push_unique(&mut rates, rate);
    }
    rates
}

/// One (source, rate) pair together with its position in the space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub source_index: usize,
    pub rate_index: usize,
    pub source: AudioSourceKind,
    pub sample_rate: u32,
}

/// Ordered sources crossed with ordered, de-duplicated rates.
///
/// Iteration is source-major: every rate of the first source, then every
/// rate of the second, and so on. The order is fully determined by the
/// inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSpace {
    sources: Vec<AudioSourceKind>,
    /// Rate list a fresh source starts from.
    base_rates: Vec<u32>,
    /// Rate list currently in use; may be spliced from the routed device.
    rates: Vec<u32>,
    requested_rate: u32,
}

impl CandidateSpace {
    pub fn new(sources: &[AudioSourceKind], rates: &[u32], requested_rate: u32) -> Self {
        let mut unique_sources = Vec::with_capacity(sources.len());
        for &source in sources {
            push_unique(&mut unique_sources, source);
        }
        let mut unique_rates = Vec::with_capacity(rates.len());
        for &rate in rates.iter().filter(|&&r| r > 0) {
            push_unique(&mut unique_rates, rate);
        }
        Self {
            sources: unique_sources,
            base_rates: unique_rates.clone(),
            rates: unique_rates,
            requested_rate,
        }
    }

    /// Build the space for a caller preference.
    ///
    /// Microphone spaces use the device-advertised rates (with the default
    /// list appended) when the platform reports any. Loopback has a single
    /// source.
    pub fn for_preference(
        preference: SourcePreference,
        requested_rate: u32,
        advertised_rates: Option<&[u32]>,
    ) -> Self {
        let sources: Vec<AudioSourceKind> = match preference {
            SourcePreference::Microphone => SOURCE_PRIORITY.to_vec(),
            SourcePreference::MicrophoneFirst(first) => std::iter::once(first)
                .chain(SOURCE_PRIORITY.iter().copied().filter(|&s| s != first))
                .collect(),
            SourcePreference::PlaybackLoopback => vec![AudioSourceKind::PlaybackLoopback],
        };
        let rates = match advertised_rates {
            Some(advertised) if !advertised.is_empty() => spliced_rates(advertised, requested_rate),
            _ => default_rates(requested_rate),
        };
        Self::new(&sources, &rates, requested_rate)
    }

    pub fn sources(&self) -> &[AudioSourceKind] {
        &self.sources
    }

    pub fn rates(&self) -> &[u32] {
        &self.rates
    }

    pub fn requested_rate(&self) -> u32 {
        self.requested_rate
    }

    /// Number of (source, rate) pairs with the current rate list.
    pub fn len(&self) -> usize {
        self.sources.len() * self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn candidate(&self, source_index: usize, rate_index: usize) -> Option<Candidate> {
        let source = *self.sources.get(source_index)?;
        let sample_rate = *self.rates.get(rate_index)?;
        Some(Candidate {
            source_index,
            rate_index,
            source,
            sample_rate,
        })
    }

    /// All candidates in priority order.
    pub fn candidates(&self) -> impl Iterator<Item = Candidate> + '_ {
        (0..self.sources.len()).flat_map(move |s| {
            (0..self.rates.len()).filter_map(move |r| self.candidate(s, r))
        })
    }

    /// Replace the active rate list (e.g. with a routed device's rates).
    pub fn set_rates(&mut self, rates: Vec<u32>) {
        let mut unique = Vec::with_capacity(rates.len());
        for rate in rates.into_iter().filter(|&r| r > 0) {
            push_unique(&mut unique, rate);
        }
        self.rates = unique;
    }

    /// Go back to the rate list the space was built with.
    pub fn reset_rates(&mut self) {
        self.rates = self.base_rates.clone();
    }
}
