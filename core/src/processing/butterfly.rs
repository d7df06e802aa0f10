use ndarray::{Array2, ShapeBuilder};
use num_complex::Complex;
use rayon::prelude::*;
use rustfft::num_traits::Zero;

use crate::math::sample::Sample;
use crate::prelude::{FdmtError, FdmtResult};
use crate::processing::phase_cache::PhaseCache;
use crate::telemetry::log::LogManager;

/// Branch geometry of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageLayout {
    pub stage: usize,
    pub branches: usize,
    pub channels_per_branch: usize,
}

impl StageLayout {
    /// Geometry of the branches entering `stage` for `channels` total channels.
    pub fn entering(channels: usize, stage: usize) -> Self {
        let branches = 1usize << stage.saturating_sub(1);
        Self {
            stage,
            branches,
            channels_per_branch: channels / branches,
        }
    }

    pub fn total_channels(&self) -> usize {
        self.branches * self.channels_per_branch
    }
}

/// Fixed-capacity pair of (bins, N) spectra addressed by branch index.
///
/// Both buffers are column-major, so branch `b` of a stage with `C` channels
/// per branch is the contiguous run of columns `b*C .. (b+1)*C`.
struct StageArena<T: Sample> {
    front: Array2<Complex<T>>,
    back: Array2<Complex<T>>,
}

impl<T: Sample> StageArena<T> {
    fn new(initial: Array2<Complex<T>>) -> Self {
        let back = Array2::from_elem(initial.raw_dim().f(), Complex::zero());
        Self {
            front: initial,
            back,
        }
    }

    fn swap(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }
}

/// Recursive split/phase/merge over the channel axis of a spectrum.
///
/// Each stage walks every branch independently. Adjacent channel pairs
/// `(a, b)` of a branch are merged twice: `a + b` feeds the lower child
/// branch (no extra delay at this stage's DM step) and
/// `a·phs[2k] + b·phs[2k+1]` feeds the upper child (this stage's DM step
/// removed). Child branches are therefore ordered by the binary expansion of
/// their trial DM, most significant stage first.
pub struct ButterflyEngine<'a, T: Sample> {
    cache: &'a PhaseCache<T>,
    logger: LogManager,
}

impl<'a, T: Sample> ButterflyEngine<'a, T> {
    pub fn new(cache: &'a PhaseCache<T>) -> Self {
        Self {
            cache,
            logger: LogManager::new("butterfly"),
        }
    }

    /// Layouts of every stage the cache defines.
    pub fn stage_layouts(&self, channels: usize) -> Vec<StageLayout> {
        (1..=self.cache.stage_count())
            .map(|stage| StageLayout::entering(channels, stage))
            .collect()
    }

    /// Runs every stage over a (bins, N) spectrum and returns the final
    /// (bins, N) buffer, branches laid out in order along the columns.
    pub fn run(&self, spectrum: Array2<Complex<T>>) -> FdmtResult<Array2<Complex<T>>> {
        let (bins, channels) = spectrum.dim();
        let spectrum = if !spectrum.t().is_standard_layout() {
            // branches must be contiguous column runs
            let mut relaid = Array2::from_elem((bins, channels).f(), Complex::zero());
            relaid.assign(&spectrum);
            relaid
        } else {
            spectrum
        };
        let mut arena = StageArena::new(spectrum);

        for layout in self.stage_layouts(channels) {
            let phases = self.cache.stage_slice(layout.stage).ok_or_else(|| {
                FdmtError::Internal(format!("phase cache has no stage {}", layout.stage))
            })?;
            if phases.len() != bins * layout.channels_per_branch {
                return Err(FdmtError::ShapeMismatch {
                    expected: (bins, layout.channels_per_branch),
                    found: (bins, phases.len() / bins.max(1)),
                });
            }

            self.logger.debug(&format!(
                "stage {}: {} branches x {} channels",
                layout.stage, layout.branches, layout.channels_per_branch
            ));

            let width = bins * layout.channels_per_branch;
            let src = arena
                .front
                .as_slice_memory_order()
                .ok_or_else(|| FdmtError::Internal("stage buffer is not contiguous".into()))?;
            let dst = arena
                .back
                .as_slice_memory_order_mut()
                .ok_or_else(|| FdmtError::Internal("stage buffer is not contiguous".into()))?;

            dst.par_chunks_mut(width)
                .zip(src.par_chunks(width))
                .for_each(|(out, branch)| merge_branch(branch, out, phases, bins));

            arena.swap();
        }

        Ok(arena.front)
    }
}

/// Pairwise merge of one branch into its two children.
fn merge_branch<T: Sample>(
    branch: &[Complex<T>],
    out: &mut [Complex<T>],
    phases: &[Complex<T>],
    bins: usize,
) {
    let (lower, upper) = out.split_at_mut(out.len() / 2);
    let pairs = branch.chunks_exact(2 * bins).zip(phases.chunks_exact(2 * bins));
    let children = lower
        .chunks_exact_mut(bins)
        .zip(upper.chunks_exact_mut(bins));

    for ((pair, pair_phases), (low, high)) in pairs.zip(children) {
        let (a, b) = pair.split_at(bins);
        let (pa, pb) = pair_phases.split_at(bins);
        for f in 0..bins {
            low[f] = a[f] + b[f];
            high[f] = a[f] * pa[f] + b[f] * pb[f];
        }
    }
}
