//! Interpolation inside the last accepted step.

use crate::control::StepControl;
use crate::error::{Result, TiaError};
use crate::store::HistoryRing;

/// Mutable view of a vector made of equally sized blocks.
///
/// Used for multi-time solutions where block `i` belongs to fast time
/// point `i`.
#[derive(Debug)]
pub struct BlockVectorMut<'a> {
    data: &'a mut [f64],
    block_size: usize,
}

impl<'a> BlockVectorMut<'a> {
    /// View `data` as blocks of `block_size` entries.
    pub fn new(data: &'a mut [f64], block_size: usize) -> Result<Self> {
        if block_size == 0 || data.len() % block_size != 0 {
            return Err(TiaError::invalid_parameter(
                "block_size",
                format!(
                    "vector of length {} cannot be split into blocks of {}",
                    data.len(),
                    block_size
                ),
            ));
        }
        Ok(Self { data, block_size })
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.data.len() / self.block_size
    }

    /// Entries per block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Block `i`.
    pub fn block(&self, i: usize) -> &[f64] {
        &self.data[i * self.block_size..(i + 1) * self.block_size]
    }

    /// Mutable block `i`.
    pub fn block_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.block_size..(i + 1) * self.block_size]
    }

    /// The whole vector.
    pub fn as_slice(&self) -> &[f64] {
        &self.data[..]
    }
}

/// Interval `[t_{n-1}, t_n]` of the last accepted step, widened by the
/// time tolerance.
fn valid_range(control: &StepControl) -> (f64, f64) {
    let tol = control.time_tolerance();
    let tn = control.current_time;
    (tn - control.used_step - tol, tn + tol)
}

fn check_range(control: &StepControl, time: f64) -> Result<()> {
    let (lower, upper) = valid_range(control);
    if time < lower || time > upper {
        return Err(TiaError::InterpolationOutOfRange { time, lower, upper });
    }
    Ok(())
}

/// Weights for `time` or `None` when `time` is on `t_n`.
fn weights(control: &StepControl, time: f64) -> Option<[f64; 3]> {
    let dt = time - control.current_time;
    if dt.abs() <= control.time_tolerance() || control.used_step == 0.0 {
        return None;
    }
    let order = control.used_order.clamp(1, 2);
    Some(control.coeffs.interpolation_weights(dt, order))
}

/// `out[range] = x0 + sum_{j>=1} gamma_j (x_j - x0)` over `range`.
fn combine(
    ring: &HistoryRing,
    gamma: &[f64; 3],
    out: &mut [f64],
    range: std::ops::Range<usize>,
) {
    let x0 = &ring.get(0)[range.clone()];
    out.copy_from_slice(x0);
    for (j, &g) in gamma.iter().enumerate().skip(1) {
        if g == 0.0 {
            continue;
        }
        let xj = &ring.get(j)[range.clone()];
        for ((o, &a), &b) in out.iter_mut().zip(xj).zip(x0) {
            *o += g * (a - b);
        }
    }
}

/// Reconstruct the history held in `ring` at `time`.
///
/// Copies slot 0 when `time` is on the last accepted time, otherwise
/// evaluates the polynomial of the last used order through the history.
pub(crate) fn interpolate_ring(
    control: &StepControl,
    ring: &HistoryRing,
    time: f64,
    out: &mut [f64],
) -> Result<()> {
    TiaError::check_len("interpolation output", ring.len(), out.len())?;
    check_range(control, time)?;
    match weights(control, time) {
        None => out.copy_from_slice(ring.get(0)),
        Some(gamma) => combine(ring, &gamma, out, 0..ring.len()),
    }
    Ok(())
}

/// Interpolate block `i` of `out` at `times[i]`.
///
/// Blocks beyond `times.len()` keep the last accepted solution.
pub(crate) fn interpolate_ring_blocks(
    control: &StepControl,
    ring: &HistoryRing,
    times: &[f64],
    out: &mut BlockVectorMut<'_>,
) -> Result<()> {
    TiaError::check_len("block vector", ring.len(), out.as_slice().len())?;
    if times.len() > out.block_count() {
        return Err(TiaError::TooManyBlocks {
            requested: times.len(),
            available: out.block_count(),
        });
    }
    for &t in times {
        check_range(control, t)?;
    }
    out.data.copy_from_slice(ring.get(0));
    let bs = out.block_size();
    for (i, &t) in times.iter().enumerate() {
        if let Some(gamma) = weights(control, t) {
            combine(ring, &gamma, out.block_mut(i), i * bs..(i + 1) * bs);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_view() {
        let mut data = vec![0.0; 6];
        let mut b = BlockVectorMut::new(&mut data, 2).unwrap();
        assert_eq!(b.block_count(), 3);
        b.block_mut(1).copy_from_slice(&[1.0, 2.0]);
        assert_eq!(b.block(1), &[1.0, 2.0]);
        assert_eq!(data, vec![0.0, 0.0, 1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_block_view_rejects_ragged() {
        let mut data = vec![0.0; 5];
        assert!(BlockVectorMut::new(&mut data, 2).is_err());
        assert!(BlockVectorMut::new(&mut data, 0).is_err());
    }
}
