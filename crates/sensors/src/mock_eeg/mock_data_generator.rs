use std::f64::consts::PI;

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Band frequencies in Hz: [delta, theta, alpha, beta]
const BAND_FREQS: [f64; 4] = [2.0, 6.0, 10.0, 20.0];

/// Band amplitudes in microvolts, cycling over channels front to back.
const CHANNEL_WEIGHTS: [[f64; 4]; 4] = [
    [12.0, 6.0, 3.0, 1.5], // frontal, delta/theta heavy
    [8.0, 5.0, 6.0, 2.0],  // central
    [6.0, 4.0, 10.0, 2.5], // parietal, stronger alpha
    [5.0, 3.0, 12.0, 2.0], // occipital, strongest alpha
];

/// Synthesizes EEG-like samples: a sum of sinusoidal bands per channel plus
/// gaussian noise. Each channel gets its own phase offsets.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    sample_rate: f64,
    channel_count: usize,
    phases: Vec<[f64; 4]>,
    noise: Option<Normal<f64>>,
    rng: StdRng,
    sample_index: u64,
}

impl SignalGenerator {
    pub fn new(sample_rate: f64, channel_count: usize, noise_std: f64, seed: u64) -> Self {
        debug!(
            "Initializing signal generator: {} Hz, {} channels",
            sample_rate, channel_count
        );
        let phases = (0..channel_count)
            .map(|c| {
                let base = c as f64 * 0.7;
                [base, base * 1.3, base * 0.5, base * 2.1]
            })
            .collect();
        // Normal::new only fails on a negative or NaN deviation.
        let noise = Normal::new(0.0, noise_std).ok().filter(|_| noise_std > 0.0);

        Self {
            sample_rate,
            channel_count,
            phases,
            noise,
            rng: StdRng::seed_from_u64(seed),
            sample_index: 0,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Produces the next sample's channel values.
    pub fn next_sample(&mut self) -> Vec<f64> {
        let t = self.sample_index as f64 / self.sample_rate;
        self.sample_index += 1;

        (0..self.channel_count)
            .map(|c| {
                let weights = CHANNEL_WEIGHTS[c % CHANNEL_WEIGHTS.len()];
                let clean: f64 = BAND_FREQS
                    .iter()
                    .zip(weights.iter())
                    .zip(self.phases[c].iter())
                    .map(|((freq, amp), phase)| amp * (2.0 * PI * freq * t + phase).sin())
                    .sum();
                let noise = match &self.noise {
                    Some(dist) => dist.sample(&mut self.rng),
                    None => 0.0,
                };
                clean + noise
            })
            .collect()
    }
}
