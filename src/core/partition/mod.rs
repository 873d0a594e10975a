#![allow(clippy::result_large_err)]

use crate::core::error::AppError;

/// Split `items` into exactly `parts` ordered, contiguous partitions.
///
/// Partition sizes differ by at most one and the first `items.len() % parts`
/// partitions carry the extra element. Partitions may be empty when there are
/// fewer items than parts.
pub fn partition<T: Clone>(items: &[T], parts: usize) -> Result<Vec<Vec<T>>, AppError> {
    if parts == 0 {
        return Err(AppError::user_entry(
            "User must allocate at least one cpu thread.",
        )
        .with_code("PARTITION-001"));
    }

    let base = items.len() / parts;
    let extra = items.len() % parts;

    let mut partitions = Vec::with_capacity(parts);
    let mut start = 0;
    for index in 0..parts {
        let len = base + usize::from(index < extra);
        partitions.push(items[start..start + len].to_vec());
        start += len;
    }

    Ok(partitions)
}
