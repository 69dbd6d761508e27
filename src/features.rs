//! Derived signal features of voltammetry sweeps.
//!
//! Every function here walks the samples in their original order; the
//! results are only meaningful for a table whose rows have not been
//! reordered since extraction.

/// Direction of the voltage sweep at every sample, as -1, 0 or +1.
///
/// Row `n` takes the sign of `v[n] - v[n-1]`; the first row takes the
/// direction of the second. A flat step (equal voltages) inherits the
/// direction before it, and leading flat steps take the first real
/// direction, so 0 only appears when the whole sweep is flat or has a
/// single row.
pub fn sweep_direction(voltage: &[f64]) -> Vec<i64> {
    let n = voltage.len();
    let mut direction = vec![0i64; n];
    if n < 2 {
        return direction;
    }

    for i in 1..n {
        direction[i] = sign(voltage[i] - voltage[i - 1]);
    }
    direction[0] = direction[1];

    // Carry directions forward over flat steps
    for i in 1..n {
        if direction[i] == 0 {
            direction[i] = direction[i - 1];
        }
    }

    // Leading flat run takes the first real direction
    if let Some(first) = direction.iter().copied().find(|d| *d != 0) {
        for d in direction.iter_mut().take_while(|d| **d == 0) {
            *d = first;
        }
    }

    direction
}

fn sign(delta: f64) -> i64 {
    if delta > 0.0 {
        1
    } else if delta < 0.0 {
        -1
    } else {
        0
    }
}

/// Trapezoidal charge increment of every row.
///
/// `dt = |dV| / scan_rate` and the current is averaged with the previous
/// row; the first row is its own predecessor and contributes nothing.
pub fn charge_increments(voltage: &[f64], current: &[f64], scan_rate: f64) -> Vec<f64> {
    let n = voltage.len().min(current.len());
    (0..n)
        .map(|i| {
            let prev = i.saturating_sub(1);
            let dt = (voltage[i] - voltage[prev]).abs() / scan_rate;
            let mid_current = (current[i] + current[prev]) / 2.0;
            mid_current * dt
        })
        .collect()
}

/// Running sum of `values`
pub fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |total, v| {
            *total += v;
            Some(*total)
        })
        .collect()
}

/// Index ranges of the maximal runs of equal value
pub fn segments(labels: &[i64]) -> Vec<std::ops::Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for i in 1..=labels.len() {
        if i == labels.len() || labels[i] != labels[start] {
            if i > start {
                ranges.push(start..i);
            }
            start = i;
        }
    }
    ranges
}

/// Cumulative charge restarted at zero at every change of sweep direction
pub fn segment_charge(increments: &[f64], direction: &[i64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(increments.len());
    for range in segments(direction) {
        out.extend(cumulative_sum(&increments[range]));
    }
    out
}

/// Min-max scale each direction segment of `charge` into `[0, 1]`.
///
/// A segment whose values are all equal maps to 0.
pub fn normalize_segments(charge: &[f64], direction: &[i64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(charge.len());
    for range in segments(direction) {
        let segment = &charge[range];
        let min = segment.iter().copied().fold(f64::INFINITY, f64::min);
        let max = segment.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = max - min;
        if span > 0.0 && span.is_finite() {
            out.extend(segment.iter().map(|q| (q - min) / span));
        } else {
            out.extend(std::iter::repeat_n(0.0, segment.len()));
        }
    }
    out
}

/// Derived columns of one voltammetry sweep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepFeatures {
    pub direction: Vec<i64>,
    pub charge: Vec<f64>,
    pub segment_charge: Vec<f64>,
    pub normalized_charge: Vec<f64>,
}

impl SweepFeatures {
    /// Charge only, for single-direction sweeps
    pub fn linear(voltage: &[f64], current: &[f64], scan_rate: f64) -> Vec<f64> {
        cumulative_sum(&charge_increments(voltage, current, scan_rate))
    }

    /// Direction, charge and per-segment charge for cyclic sweeps
    pub fn cyclic(voltage: &[f64], current: &[f64], scan_rate: f64) -> Self {
        let direction = sweep_direction(voltage);
        let increments = charge_increments(voltage, current, scan_rate);
        let charge = cumulative_sum(&increments);
        let segment_charge = segment_charge(&increments, &direction);
        let normalized_charge = normalize_segments(&segment_charge, &direction);

        Self {
            direction,
            charge,
            segment_charge,
            normalized_charge,
        }
    }
}
