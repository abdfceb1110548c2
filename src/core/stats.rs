use crate::core::model::LogicalLine;

/// Font size assumed when there is nothing to measure.
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Document-wide statistics the line classifier compares against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStats {
    pub dominant_width: f32,
    pub median_font_size: f32,
}

impl LineStats {
    /// `None` when there are no lines to measure.
    pub fn measure(lines: &[LogicalLine]) -> Option<Self> {
        let widths: Vec<f32> = lines.iter().map(LogicalLine::width).collect();
        let dominant_width = dominant_width(&widths)?;
        let sizes: Vec<f32> = lines.iter().map(|line| line.size).collect();
        Some(Self {
            dominant_width,
            median_font_size: upper_median(&sizes).unwrap_or(DEFAULT_FONT_SIZE),
        })
    }
}

/// Mode of the widths after flooring each to a multiple of 10. Ties go to the
/// value seen first.
pub fn dominant_width(widths: &[f32]) -> Option<f32> {
    let mut counts: Vec<(i64, usize)> = Vec::new();
    for width in widths {
        let bucket = (width / 10.0).floor() as i64 * 10;
        match counts.iter_mut().find(|(value, _)| *value == bucket) {
            Some((_, count)) => *count += 1,
            None => counts.push((bucket, 1)),
        }
    }

    let mut best: Option<(i64, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value as f32)
}

/// `sorted[len / 2]`, i.e. the upper median for even-length input.
pub fn upper_median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(sorted[sorted.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_width_floors_into_buckets() {
        let widths = [431.0, 438.9, 120.0, 436.2, 125.0, 129.9];
        // 430 x3, 120 x3: first seen wins
        assert_eq!(dominant_width(&widths), Some(430.0));
        assert_eq!(dominant_width(&[12.0, 55.0, 57.0]), Some(50.0));
        assert_eq!(dominant_width(&[]), None);
    }

    #[test]
    fn median_takes_upper_middle() {
        assert_eq!(upper_median(&[11.0, 18.0]), Some(18.0));
        assert_eq!(upper_median(&[11.0, 10.0, 18.0]), Some(11.0));
        assert_eq!(upper_median(&[]), None);
    }
}
