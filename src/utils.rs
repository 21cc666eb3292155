//! Utility functions

/// Row-major strides (in elements) for the given axis lengths
///
/// The last axis varies fastest, so its stride is 1.
pub fn row_major_strides(lengths: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; lengths.len()];
    for i in (0..lengths.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * lengths[i + 1];
    }
    strides
}

/// Number of elements in a region; a rank-0 region holds one element
pub fn element_count(lengths: &[usize]) -> usize {
    lengths.iter().product()
}

/// Bytes needed for a region of `width`-byte elements, or `None` if it overflows `usize`
pub fn checked_byte_len(lengths: &[usize], width: usize) -> Option<usize> {
    lengths
        .iter()
        .try_fold(width, |total, &length| total.checked_mul(length))
}

/// Format byte size in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Join axis lengths as "2 x 3 x 4"
pub fn format_shape(lengths: &[usize]) -> String {
    lengths
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(" x ")
}
