use model::{
    execution::job::ConfigError,
    pagination::cursor::{KeyRange, OrderingKey},
};

/// One slice of an integer key range, run as its own job instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub id: String,
    pub range: KeyRange,
}

/// Splits `[start, end]` into at most `count` disjoint, contiguous ranges
/// that together cover it. Earlier partitions take the remainder, so sizes
/// differ by at most one. Never yields more partitions than keys.
pub fn plan_partitions(
    start: i64,
    end: i64,
    count: usize,
) -> Result<Vec<Partition>, ConfigError> {
    if count == 0 {
        return Err(ConfigError::Invalid(
            "partition count must be greater than zero".into(),
        ));
    }
    if start > end {
        return Err(ConfigError::Invalid(format!(
            "partition start {start} is after end {end}"
        )));
    }

    let span = i128::from(end) - i128::from(start) + 1;
    let count = (count as i128).min(span);
    let base = span / count;
    let extra = span % count;

    let mut partitions = Vec::with_capacity(count as usize);
    let mut lo = i128::from(start);
    for n in 0..count {
        let size = base + i128::from(n < extra);
        let hi = lo + size - 1;
        partitions.push(Partition {
            id: format!("p{n}"),
            range: KeyRange::new(
                OrderingKey::Integer(lo as i64),
                OrderingKey::Integer(hi as i64),
            ),
        });
        lo = hi + 1;
    }
    Ok(partitions)
}
