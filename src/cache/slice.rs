use std::ops::Range;

/// Resolves an offset/length request against a sequence of `len` items.
///
/// - negative `offset` counts from the end
/// - `limit = None` runs to the end
/// - positive `limit` takes at most that many items
/// - negative `limit` stops `|limit|` items before the end
/// - zero `limit` is empty
pub fn slice_window(len: usize, offset: i64, limit: Option<i64>) -> Range<usize> {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);

    let start = if offset < 0 {
        (len_i + offset).max(0)
    } else {
        offset.min(len_i)
    };

    let end = match limit {
        None => len_i,
        Some(0) => start,
        Some(limit) if limit > 0 => start.saturating_add(limit).min(len_i),
        Some(limit) => (len_i + limit).max(start),
    };

    start as usize..end as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(len: usize, offset: i64, limit: Option<i64>) -> Vec<usize> {
        (0..len).collect::<Vec<_>>()[slice_window(len, offset, limit)].to_vec()
    }

    #[test]
    fn test_negative_offset_reads_from_end() {
        assert_eq!(slice(5, -2, None), vec![3, 4]);
        assert_eq!(slice(5, -9, Some(2)), vec![0, 1]);
    }

    #[test]
    fn test_negative_limit_stops_before_end() {
        assert_eq!(slice(5, 0, Some(-1)), vec![0, 1, 2, 3]);
        assert_eq!(slice(5, 1, Some(-2)), vec![1, 2]);
        assert_eq!(slice(5, 4, Some(-3)), Vec::<usize>::new());
    }

    #[test]
    fn test_positive_and_zero_limits() {
        assert_eq!(slice(5, 1, Some(2)), vec![1, 2]);
        assert_eq!(slice(5, 3, Some(10)), vec![3, 4]);
        assert_eq!(slice(5, 0, Some(0)), Vec::<usize>::new());
        assert_eq!(slice(5, 7, None), Vec::<usize>::new());
    }
}
