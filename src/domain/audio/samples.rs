use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::time::Duration;

/// Mono linear PCM at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSamples {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioSamples {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn silence(duration: Duration, sample_rate: u32) -> Self {
        let len = (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Convert to another sample rate; a no-op when the rates already match
    pub fn resampled(self, target_rate: u32) -> anyhow::Result<Self> {
        if self.sample_rate == target_rate || self.samples.is_empty() {
            return Ok(Self::new(self.samples, target_rate));
        }
        if self.sample_rate == 0 {
            anyhow::bail!("cannot resample audio with an unknown sample rate");
        }

        let ratio = f64::from(target_rate) / f64::from(self.sample_rate);
        // One chunk covering the whole buffer so a single pass consumes it
        let mut resampler = FastFixedIn::<f32>::new(
            ratio,
            1.1,
            PolynomialDegree::Cubic,
            self.samples.len(),
            1,
        )
        .map_err(|e| anyhow::anyhow!("Resampler init failed: {}", e))?;

        let mut output = resampler
            .process(&[self.samples.as_slice()], None)
            .map_err(|e| anyhow::anyhow!("Resampling failed: {}", e))?;

        let samples = output.pop().unwrap_or_default();
        Ok(Self::new(samples, target_rate))
    }
}
