//! Bounded-memory streaming convolution via overlap-add and overlap-save.

use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::core::fft::{RustFftTransform, SpectralTransform, COMPLEX_ZERO};
use crate::core::types::{ensure_same_rate, Signal};
use crate::error::{Result, SignalError};

/// Block filtering algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMethod {
    OverlapAdd,
    OverlapSave,
    /// Let the processor choose. Resolves to [`FilterMethod::OverlapSave`],
    /// whose state is plain input history with no accumulation step.
    #[default]
    Auto,
}

impl FilterMethod {
    /// The concrete algorithm this method runs.
    pub fn resolve(self) -> FilterMethod {
        match self {
            FilterMethod::Auto => FilterMethod::OverlapSave,
            other => other,
        }
    }
}

/// Shared contract of the streaming block filters.
///
/// Chunks must be supplied in stream order by a single owner. Each call to
/// [`process`](BlockFilter::process) returns exactly as many samples as it
/// was given; [`flush`](BlockFilter::flush) returns the remaining
/// `kernel_len - 1` samples of the convolution tail and rewinds the
/// processor for a new stream.
pub trait BlockFilter {
    /// Input samples consumed per block transform.
    fn hop_size(&self) -> usize;

    /// Filters the next chunk of the stream.
    fn process(&mut self, chunk: &[f32]) -> Vec<f32>;

    /// Emits the pending tail and clears the overlap state.
    fn flush(&mut self) -> Vec<f32>;

    /// Clears the overlap state without emitting it.
    fn reset(&mut self);
}

/// Kernel spectrum plus the transform and scratch buffer used for every block.
struct BlockKernel {
    block_size: usize,
    kernel_len: usize,
    /// Forward transform of the zero-padded kernel, computed once.
    spectrum: Vec<Complex<f32>>,
    transform: RustFftTransform,
    scratch: Vec<Complex<f32>>,
}

impl BlockKernel {
    fn new(kernel: &[f32], block_size: usize) -> Result<Self> {
        if kernel.is_empty() {
            return Err(SignalError::InvalidBlock("kernel must be non-empty".to_string()));
        }
        if block_size == 0 {
            return Err(SignalError::InvalidBlock("block size must be positive".to_string()));
        }
        if kernel.len() > block_size {
            return Err(SignalError::KernelTooLong {
                kernel_len: kernel.len(),
                block_size,
            });
        }

        let mut transform = RustFftTransform::new();
        let mut spectrum = vec![COMPLEX_ZERO; block_size];
        for (dst, &k) in spectrum.iter_mut().zip(kernel.iter()) {
            *dst = Complex::new(k, 0.0);
        }
        transform.forward(&mut spectrum);

        Ok(Self {
            block_size,
            kernel_len: kernel.len(),
            spectrum,
            transform,
            scratch: vec![COMPLEX_ZERO; block_size],
        })
    }

    #[inline]
    fn hop_size(&self) -> usize {
        self.block_size - self.kernel_len + 1
    }

    #[inline]
    fn overlap(&self) -> usize {
        self.kernel_len - 1
    }

    /// Circularly convolves `parts` (concatenated, zero-padded to the block
    /// size) with the kernel. The result is left in `self.scratch`.
    fn filter_block(&mut self, parts: &[&[f32]]) {
        self.scratch.fill(COMPLEX_ZERO);
        let mut idx = 0;
        for part in parts {
            for &s in part.iter() {
                self.scratch[idx] = Complex::new(s, 0.0);
                idx += 1;
            }
        }
        debug_assert!(idx <= self.block_size);

        self.transform.forward(&mut self.scratch);
        for (x, k) in self.scratch.iter_mut().zip(self.spectrum.iter()) {
            *x *= *k;
        }
        self.transform.inverse(&mut self.scratch);
    }
}

/// Overlap-add block convolution.
///
/// Each hop-sized segment is zero-padded to the block size and filtered; the
/// first `kernel_len - 1` output samples are summed with the tail carried
/// from the previous block, and the block's own trailing samples become the
/// new tail.
pub struct OverlapAdd {
    kernel: BlockKernel,
    tail: Vec<f32>,
}

impl OverlapAdd {
    /// # Errors
    /// Fails with [`SignalError::KernelTooLong`] if the kernel exceeds
    /// `block_size`, or [`SignalError::InvalidBlock`] for an empty kernel or
    /// a zero block size.
    pub fn new(kernel: &[f32], block_size: usize) -> Result<Self> {
        let kernel = BlockKernel::new(kernel, block_size)?;
        let tail = vec![0.0; kernel.overlap()];
        Ok(Self { kernel, tail })
    }

    fn process_segment(&mut self, segment: &[f32], output: &mut Vec<f32>) {
        let s = segment.len();
        let overlap = self.kernel.overlap();
        self.kernel.filter_block(&[segment]);

        let mut combined: Vec<f32> = self.kernel.scratch[..s + overlap]
            .iter()
            .map(|c| c.re)
            .collect();
        for (dst, &t) in combined.iter_mut().zip(self.tail.iter()) {
            *dst += t;
        }

        output.extend_from_slice(&combined[..s]);
        self.tail.copy_from_slice(&combined[s..]);
    }
}

impl BlockFilter for OverlapAdd {
    fn hop_size(&self) -> usize {
        self.kernel.hop_size()
    }

    fn process(&mut self, chunk: &[f32]) -> Vec<f32> {
        let mut output = Vec::with_capacity(chunk.len());
        for segment in chunk.chunks(self.hop_size()) {
            log::trace!("overlap-add block: {} input samples", segment.len());
            self.process_segment(segment, &mut output);
        }
        output
    }

    fn flush(&mut self) -> Vec<f32> {
        let tail = self.tail.clone();
        self.reset();
        tail
    }

    fn reset(&mut self) {
        self.tail.fill(0.0);
    }
}

/// Overlap-save block convolution.
///
/// The last `kernel_len - 1` input samples are kept as history and prepended
/// to each hop-sized segment. The first `kernel_len - 1` outputs of every
/// block are corrupted by circular wraparound and discarded.
pub struct OverlapSave {
    kernel: BlockKernel,
    history: Vec<f32>,
}

impl OverlapSave {
    /// # Errors
    /// Same configuration errors as [`OverlapAdd::new`].
    pub fn new(kernel: &[f32], block_size: usize) -> Result<Self> {
        let kernel = BlockKernel::new(kernel, block_size)?;
        let history = vec![0.0; kernel.overlap()];
        Ok(Self { kernel, history })
    }

    fn process_segment(&mut self, segment: &[f32], output: &mut Vec<f32>) {
        let s = segment.len();
        let overlap = self.kernel.overlap();
        self.kernel.filter_block(&[self.history.as_slice(), segment]);
        output.extend(self.kernel.scratch[overlap..overlap + s].iter().map(|c| c.re));

        // Shift history left by `s` and append the newest input.
        if overlap > 0 {
            if s >= overlap {
                self.history.copy_from_slice(&segment[s - overlap..]);
            } else {
                self.history.copy_within(s.., 0);
                self.history[overlap - s..].copy_from_slice(segment);
            }
        }
    }
}

impl BlockFilter for OverlapSave {
    fn hop_size(&self) -> usize {
        self.kernel.hop_size()
    }

    fn process(&mut self, chunk: &[f32]) -> Vec<f32> {
        let mut output = Vec::with_capacity(chunk.len());
        for segment in chunk.chunks(self.hop_size()) {
            log::trace!("overlap-save block: {} input samples", segment.len());
            self.process_segment(segment, &mut output);
        }
        output
    }

    fn flush(&mut self) -> Vec<f32> {
        let zeros = vec![0.0; self.kernel.overlap()];
        let tail = self.process(&zeros);
        self.reset();
        tail
    }

    fn reset(&mut self) {
        self.history.fill(0.0);
    }
}

/// Streaming convolution with a fixed kernel.
///
/// Memory use is bounded by the block size regardless of stream length.
/// Callers should feed chunks whose lengths are multiples of
/// [`hop_size`](BlockFilter::hop_size); a shorter final chunk is handled
/// exactly. The concatenation of every `process` output followed by `flush`
/// equals the full linear convolution of the stream with the kernel.
///
/// ```
/// use sigkernel::{BlockConvolver, BlockFilter, FilterMethod};
///
/// let mut conv = BlockConvolver::new(&[1.0, 1.0], 4, FilterMethod::OverlapAdd).unwrap();
/// assert_eq!(conv.hop_size(), 3);
/// let mut out = conv.process(&[1.0, 2.0, 3.0]);
/// out.extend(conv.flush());
/// assert_eq!(out.len(), 4);
/// assert!((out[1] - 3.0).abs() < 1e-5);
/// ```
pub enum BlockConvolver {
    OverlapAdd(OverlapAdd),
    OverlapSave(OverlapSave),
}

impl BlockConvolver {
    /// Builds a processor, transforming the kernel once.
    ///
    /// # Errors
    /// Fails before any processing if the kernel is empty, longer than
    /// `block_size`, or `block_size` is zero.
    pub fn new(kernel: &[f32], block_size: usize, method: FilterMethod) -> Result<Self> {
        let method = method.resolve();
        let convolver = match method {
            FilterMethod::OverlapAdd => {
                BlockConvolver::OverlapAdd(OverlapAdd::new(kernel, block_size)?)
            }
            _ => BlockConvolver::OverlapSave(OverlapSave::new(kernel, block_size)?),
        };
        log::debug!(
            "block convolver: method={:?}, block_size={}, kernel_len={}, hop={}",
            method,
            block_size,
            kernel.len(),
            convolver.hop_size()
        );
        Ok(convolver)
    }

    /// The concrete algorithm in use.
    pub fn method(&self) -> FilterMethod {
        match self {
            BlockConvolver::OverlapAdd(_) => FilterMethod::OverlapAdd,
            BlockConvolver::OverlapSave(_) => FilterMethod::OverlapSave,
        }
    }

    /// Transform size per block.
    pub fn block_size(&self) -> usize {
        match self {
            BlockConvolver::OverlapAdd(f) => f.kernel.block_size,
            BlockConvolver::OverlapSave(f) => f.kernel.block_size,
        }
    }

    /// Number of tail samples [`flush`](BlockFilter::flush) returns.
    pub fn tail_len(&self) -> usize {
        match self {
            BlockConvolver::OverlapAdd(f) => f.kernel.overlap(),
            BlockConvolver::OverlapSave(f) => f.kernel.overlap(),
        }
    }
}

impl BlockFilter for BlockConvolver {
    fn hop_size(&self) -> usize {
        match self {
            BlockConvolver::OverlapAdd(f) => f.hop_size(),
            BlockConvolver::OverlapSave(f) => f.hop_size(),
        }
    }

    fn process(&mut self, chunk: &[f32]) -> Vec<f32> {
        match self {
            BlockConvolver::OverlapAdd(f) => f.process(chunk),
            BlockConvolver::OverlapSave(f) => f.process(chunk),
        }
    }

    fn flush(&mut self) -> Vec<f32> {
        match self {
            BlockConvolver::OverlapAdd(f) => f.flush(),
            BlockConvolver::OverlapSave(f) => f.flush(),
        }
    }

    fn reset(&mut self) {
        match self {
            BlockConvolver::OverlapAdd(f) => f.reset(),
            BlockConvolver::OverlapSave(f) => f.reset(),
        }
    }
}

/// Filters a whole signal with `kernel` block by block.
///
/// Returns the causal filter output, `len(signal)` samples equal to the
/// first `len(signal)` samples of the full convolution. A signal shorter
/// than `block_size` is returned unmodified.
///
/// # Errors
/// Configuration errors from [`BlockConvolver::new`], or mismatched sample
/// rates, are reported before any sample is processed.
pub fn block_convolve(
    signal: &Signal,
    kernel: &Signal,
    block_size: usize,
    method: FilterMethod,
) -> Result<Signal> {
    ensure_same_rate(signal.sample_rate(), kernel.sample_rate())?;
    let mut convolver = BlockConvolver::new(kernel.samples(), block_size, method)?;

    if signal.len() < block_size {
        log::debug!(
            "signal of {} samples is shorter than block size {}; passing through",
            signal.len(),
            block_size
        );
        return Ok(signal.clone());
    }

    let output = convolver.process(signal.samples());
    Ok(Signal::with_rate_of(output, signal.sample_rate()))
}
