use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

/// Samples of linear fade applied at each end of a tone (10ms at 44.1kHz)
/// so cues start and stop without clicks.
const EDGE_SAMPLES: usize = 441;

/// Fixed-length sine beep. Unlike an ambient bed this source is finite: the
/// iterator ends once the requested duration has been emitted.
pub struct Tone {
    freq: f32,
    sample_rate: u32,
    num_sample: usize,
    total_samples: usize,
}

impl Tone {
    pub fn new(freq: f32, duration: Duration) -> Self {
        let sample_rate = 44100;
        Self {
            freq,
            sample_rate,
            num_sample: 0,
            total_samples: (duration.as_secs_f32() * sample_rate as f32) as usize,
        }
    }

    fn envelope(&self) -> f32 {
        let n = self.num_sample;
        let remaining = self.total_samples - n;
        let edge = EDGE_SAMPLES.min(self.total_samples / 2).max(1);
        let attack = (n as f32 / edge as f32).min(1.0);
        let release = (remaining as f32 / edge as f32).min(1.0);
        attack.min(release)
    }
}

impl Iterator for Tone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / self.sample_rate as f32;
        let sample = (2.0 * PI * self.freq * t).sin() * self.envelope();
        self.num_sample += 1;

        Some(sample * 0.25) // Lower amplitude to prevent clipping
    }
}

impl Source for Tone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / self.sample_rate as f32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_exactly_the_requested_duration() {
        let tone = Tone::new(620.0, Duration::from_millis(100));
        let samples: Vec<f32> = tone.collect();
        assert_eq!(samples.len(), 4410);
    }

    #[test]
    fn samples_stay_within_amplitude_bounds() {
        let tone = Tone::new(1244.0, Duration::from_millis(250));
        for sample in tone {
            assert!(sample.abs() <= 0.25, "sample {} out of range", sample);
        }
    }

    #[test]
    fn fades_in_and_out() {
        let samples: Vec<f32> = Tone::new(620.0, Duration::from_millis(200)).collect();
        assert!(samples[0].abs() < 0.01);
        assert!(samples[samples.len() - 1].abs() < 0.01);
        // Mid-tone carries real signal.
        assert!(samples.iter().any(|s| s.abs() > 0.2));
    }

    #[test]
    fn zero_duration_yields_no_samples() {
        let mut tone = Tone::new(620.0, Duration::ZERO);
        assert!(tone.next().is_none());
    }
}
