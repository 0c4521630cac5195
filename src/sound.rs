use fundsp::prelude32::*;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::warn;

const SAMPLE_RATE: u32 = 44_100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Falling sawtooth when the run resets.
    Death,
    /// Short rising blip on take-off.
    Jump,
}

/// Linear ramp from `from` to `to` over `secs`, then held.
fn ramp(from: f32, to: f32, secs: f32, t: f32) -> f32 {
    from + (to - from) * (t / secs).min(1.0)
}

impl Effect {
    fn length_secs(self) -> f32 {
        match self {
            Effect::Death => 0.5,
            Effect::Jump => 0.15,
        }
    }

    /// Mono samples at `SAMPLE_RATE`.
    pub fn render(self) -> Vec<f32> {
        let mut graph: Box<dyn AudioUnit> = match self {
            // 400Hz down to 80Hz over 0.4s, fading out over 0.5s
            Effect::Death => Box::new(
                (lfo(|t: f32| ramp(400.0, 80.0, 0.4, t)) >> saw())
                    * lfo(|t: f32| ramp(0.15, 0.0, 0.5, t)),
            ),
            Effect::Jump => Box::new(
                (lfo(|t: f32| ramp(300.0, 900.0, 0.12, t)) >> square())
                    * lfo(|t: f32| ramp(0.08, 0.0, 0.15, t)),
            ),
        };
        graph.set_sample_rate(SAMPLE_RATE as f64);
        graph.reset();

        let n = (self.length_secs() * SAMPLE_RATE as f32) as usize;
        (0..n).map(|_| graph.get_mono()).collect()
    }
}

/// Audio output. The stream must outlive every sink played on it.
pub struct Sound {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl Sound {
    /// `None` when no output device is available; the game runs silent.
    pub fn open() -> Option<Self> {
        match OutputStream::try_default() {
            Ok((stream, handle)) => Some(Self {
                _stream: stream,
                handle,
            }),
            Err(e) => {
                warn!(error = %e, "no audio output, playing silently");
                None
            }
        }
    }

    pub fn play(&self, effect: Effect) {
        let sink = match Sink::try_new(&self.handle) {
            Ok(sink) => sink,
            Err(e) => {
                warn!(error = %e, ?effect, "could not play effect");
                return;
            }
        };
        sink.append(SamplesBuffer::new(1, SAMPLE_RATE, effect.render()));
        sink.detach(); // play in background
    }
}
