//! Chunk-driven phase vocoder whose output matches the batch stretch.

use crate::core::fft::normalize_with_peak;
use crate::error::{Result, SignalError};
use crate::stretch::params::{StretchConfig, TsmAlgorithm};
use crate::stretch::phase_vocoder::PhaseVocoder;

/// Streaming chunk-based phase vocoder.
///
/// Input chunks of any size are buffered until a full analysis frame is
/// available. Output samples are emitted as soon as no later frame can
/// overlap them, so the concatenation of every `process` result followed by
/// `flush` equals [`PhaseVocoder::stretch`] on the whole input.
pub struct StretchStream {
    vocoder: PhaseVocoder,
    window_squared: Vec<f32>,
    window_sum_peak: f32,
    /// Unconsumed input, starting at the next frame's analysis position.
    input_buffer: Vec<f32>,
    /// Overlap-add accumulator, starting at synthesis position `out_origin`.
    output_buffer: Vec<f32>,
    window_sum: Vec<f32>,
    out_origin: usize,
    /// Leading output samples that belong to the silent front padding.
    discard: usize,
    front_pad: usize,
    input_len: usize,
    emitted: usize,
    frames: usize,
}

impl StretchStream {
    /// Creates a stream for a phase vocoder configuration.
    ///
    /// # Errors
    /// Fails if `config` names WSOLA, has invalid window parameters, or
    /// `factor` is invalid.
    pub fn new(config: &StretchConfig, factor: f64) -> Result<Self> {
        if !config.algorithm.is_spectral() {
            return Err(SignalError::Config(format!(
                "streaming needs a phase vocoder algorithm, got {:?}",
                config.algorithm
            )));
        }
        config.validate()?;
        let locking = config.algorithm != TsmAlgorithm::PhaseVocoder;
        let vocoder = PhaseVocoder::with_window(
            config.window_size,
            config.hop_size,
            factor,
            locking,
            config.window,
        )?;
        let window_squared = vocoder.window().iter().map(|w| w * w).collect();
        let window_sum_peak = vocoder.window_sum_peak();

        let mut stream = Self {
            window_squared,
            window_sum_peak,
            input_buffer: Vec::new(),
            output_buffer: Vec::new(),
            window_sum: Vec::new(),
            out_origin: 0,
            discard: 0,
            front_pad: vocoder.front_pad(),
            input_len: 0,
            emitted: 0,
            frames: 0,
            vocoder,
        };
        stream.reset();
        Ok(stream)
    }

    /// Feeds a chunk and returns the output samples finalized by it.
    ///
    /// May return an empty vector while the first frame is still filling.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.input_buffer.extend_from_slice(input);
        self.input_len += input.len();
        let ready = self.run_frames()?;
        Ok(self.emit(ready))
    }

    /// Processes the buffered tail and returns the remaining output.
    ///
    /// Total output over the stream is `round(input_len * factor)` samples.
    /// The stream is reset afterwards.
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        if self.input_len == 0 {
            self.reset();
            return Ok(vec![]);
        }
        let n = self.vocoder.window_size();
        self.input_buffer.resize(self.input_buffer.len() + n, 0.0);
        self.run_frames()?;

        let ready = self.output_buffer.len();
        let mut tail = self.emit(ready);
        let target = self.vocoder.output_len(self.input_len);
        let wanted = target.saturating_sub(self.emitted - tail.len());
        tail.resize(wanted, 0.0);

        log::debug!(
            "stream flushed: {} input samples, {} frames, {} output samples",
            self.input_len,
            self.frames,
            target
        );
        self.reset();
        Ok(tail)
    }

    /// Clears all buffered state; the next chunk starts a new signal.
    pub fn reset(&mut self) {
        self.vocoder.reset_with_front_pad(self.front_pad);
        self.input_buffer.clear();
        self.input_buffer.resize(self.front_pad, 0.0);
        self.output_buffer.clear();
        self.window_sum.clear();
        self.out_origin = 0;
        self.discard = self.front_pad;
        self.input_len = 0;
        self.emitted = 0;
        self.frames = 0;
    }

    /// Input samples that must arrive after a given sample before the
    /// output covering it is final.
    pub fn latency_samples(&self) -> usize {
        self.vocoder.window_size()
    }

    #[inline]
    pub fn hop_synthesis(&self) -> usize {
        self.vocoder.hop_synthesis()
    }

    /// Runs every complete frame in the input buffer. Returns how many
    /// leading samples of the output accumulator are final.
    fn run_frames(&mut self) -> Result<usize> {
        let n = self.vocoder.window_size();
        let ha = self.vocoder.hop_analysis();

        let mut read_pos = 0;
        while read_pos + n <= self.input_buffer.len() {
            let write_pos = self.vocoder.synthesis_position(self.frames) - self.out_origin;
            if self.output_buffer.len() < write_pos + n {
                self.output_buffer.resize(write_pos + n, 0.0);
                self.window_sum.resize(write_pos + n, 0.0);
            }
            let frame = &self.input_buffer[read_pos..read_pos + n];
            let synthesized = self.vocoder.process_frame(frame)?;
            let out = &mut self.output_buffer[write_pos..write_pos + n];
            for (o, &s) in out.iter_mut().zip(synthesized) {
                *o += s;
            }
            let ws = &mut self.window_sum[write_pos..write_pos + n];
            for (w, &sq) in ws.iter_mut().zip(&self.window_squared) {
                *w += sq;
            }
            log::trace!("stream frame {} -> {}", self.frames, write_pos + self.out_origin);
            self.frames += 1;
            read_pos += ha;
        }
        self.input_buffer.drain(..read_pos);
        // Positions before the next frame's start receive no more overlap.
        let next = self.vocoder.synthesis_position(self.frames) - self.out_origin;
        Ok(next.min(self.output_buffer.len()))
    }

    /// Normalizes and removes the first `ready` accumulated samples,
    /// dropping any that belong to the front padding.
    fn emit(&mut self, ready: usize) -> Vec<f32> {
        if ready == 0 {
            return vec![];
        }
        let mut samples: Vec<f32> = self.output_buffer.drain(..ready).collect();
        let sums: Vec<f32> = self.window_sum.drain(..ready).collect();
        self.out_origin += ready;
        normalize_with_peak(&mut samples, &sums, self.window_sum_peak);

        let skip = self.discard.min(samples.len());
        self.discard -= skip;
        samples.drain(..skip);
        self.emitted += samples.len();
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / 44100.0).sin())
            .collect()
    }

    fn pv_config(window: usize, hop: usize) -> StretchConfig {
        StretchConfig::for_algorithm(TsmAlgorithm::PhaseVocoderWithPhaseLocking, 44100)
            .with_window_size(window)
            .with_hop_size(hop)
    }

    #[test]
    fn test_stream_matches_batch() {
        let signal = sine(20000);
        let config = pv_config(1024, 256);

        let mut batch = PhaseVocoder::new(1024, 256, 1.5, true).unwrap();
        let expected = batch.stretch(&signal).unwrap();

        for &chunk_size in &[1usize, 333, 4096, 20000] {
            let mut stream = StretchStream::new(&config, 1.5).unwrap();
            let mut output = Vec::new();
            for chunk in signal.chunks(chunk_size) {
                output.extend(stream.process(chunk).unwrap());
            }
            output.extend(stream.flush().unwrap());
            assert_eq!(output.len(), expected.len(), "chunk {}", chunk_size);
            for (i, (a, b)) in output.iter().zip(expected.iter()).enumerate() {
                assert!((a - b).abs() < 1e-5, "chunk {} sample {}", chunk_size, i);
            }
        }
    }

    #[test]
    fn test_fractional_hops_match_batch() {
        let signal = sine(30000);
        let config = pv_config(1024, 256);
        let mut batch = PhaseVocoder::new(1024, 256, 1.0008, true).unwrap();
        let expected = batch.stretch(&signal).unwrap();
        assert_eq!(expected.len(), 30024);

        let mut stream = StretchStream::new(&config, 1.0008).unwrap();
        let mut output = Vec::new();
        for chunk in signal.chunks(777) {
            output.extend(stream.process(chunk).unwrap());
        }
        output.extend(stream.flush().unwrap());
        assert_eq!(output.len(), expected.len());
        for (i, (a, b)) in output.iter().zip(expected.iter()).enumerate() {
            assert!((a - b).abs() < 1e-5, "sample {}", i);
        }
    }

    #[test]
    fn test_constant_input_keeps_level() {
        let mut stream = StretchStream::new(&pv_config(1024, 256), 2.0).unwrap();
        let mut output = stream.process(&[0.5; 16000]).unwrap();
        output.extend(stream.flush().unwrap());
        assert_eq!(output.len(), 32000);
        for (i, &v) in output[4096..28000].iter().enumerate() {
            assert!((v - 0.5).abs() < 0.02, "sample {}: {}", i + 4096, v);
        }
    }

    #[test]
    fn test_no_output_before_first_frame() {
        let mut stream = StretchStream::new(&pv_config(1024, 256), 2.0).unwrap();
        assert!(stream.process(&sine(100)).unwrap().is_empty());
        assert_eq!(stream.latency_samples(), 1024);
    }

    #[test]
    fn test_reset_restarts_stream() {
        let signal = sine(8000);
        let mut stream = StretchStream::new(&pv_config(512, 128), 0.75).unwrap();
        let mut first = stream.process(&signal).unwrap();
        first.extend(stream.flush().unwrap());

        stream.process(&sine(300)).unwrap();
        stream.reset();
        let mut second = stream.process(&signal).unwrap();
        second.extend(stream.flush().unwrap());
        assert_eq!(first, second);
        assert_eq!(first.len(), 6000);
    }

    #[test]
    fn test_flush_empty_stream() {
        let mut stream = StretchStream::new(&pv_config(512, 128), 2.0).unwrap();
        assert!(stream.flush().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_wsola() {
        let config = StretchConfig::for_algorithm(TsmAlgorithm::Wsola, 44100);
        assert!(matches!(
            StretchStream::new(&config, 2.0),
            Err(SignalError::Config(_))
        ));
    }
}
