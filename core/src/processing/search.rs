use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::axes::DmAxis;
use crate::math::stats::StatsHelper;
use crate::prelude::{FdmtError, FdmtResult};

/// Strongest point of a DM-time matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub time_index: usize,
    pub dm_index: usize,
    pub time_s: f64,
    pub dm: f64,
    pub power: f64,
}

fn check_shape(result: &ArrayView2<f64>, rows: usize, dm_axis: &DmAxis) -> FdmtResult<()> {
    let expected = (rows, dm_axis.len());
    if result.dim() != expected {
        return Err(FdmtError::ShapeMismatch {
            expected,
            found: result.dim(),
        });
    }
    Ok(())
}

/// Global maximum of `result`, skipping non-finite cells.
pub fn find_peak(
    result: ArrayView2<f64>,
    times: &[f64],
    dm_axis: &DmAxis,
) -> FdmtResult<Option<Candidate>> {
    check_shape(&result, times.len(), dm_axis)?;
    let cols = result.ncols();
    Ok(StatsHelper::argmax(result.iter()).map(|(flat, power)| {
        let (time_index, dm_index) = (flat / cols, flat % cols);
        Candidate {
            time_index,
            dm_index,
            time_s: times[time_index],
            dm: dm_axis.as_slice()[dm_index],
            power,
        }
    }))
}

/// Per time sample, the maximum over columns with trial DM in `[lo, hi)`.
pub fn max_over_dm_range(
    result: ArrayView2<f64>,
    dm_axis: &DmAxis,
    lo: f64,
    hi: f64,
) -> FdmtResult<Vec<f64>> {
    check_shape(&result, result.nrows(), dm_axis)?;
    let columns: Vec<usize> = dm_axis
        .as_slice()
        .iter()
        .enumerate()
        .filter(|&(_, &dm)| dm >= lo && dm < hi)
        .map(|(idx, _)| idx)
        .collect();
    if columns.is_empty() {
        return Err(FdmtError::InvalidParameter(format!(
            "no trial DM in [{}, {})",
            lo, hi
        )));
    }

    Ok(result
        .rows()
        .into_iter()
        .map(|row| {
            columns
                .iter()
                .map(|&c| row[c])
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .collect())
}
