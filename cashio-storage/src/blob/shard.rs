//! Splitting a stored byte stream into a fixed number of shards.

/// Split `data` into exactly `shard_count` contiguous chunks of
/// `ceil(len / shard_count)` bytes. Trailing shards are empty when the data
/// runs out early.
pub fn split(data: &[u8], shard_count: u32) -> Vec<&[u8]> {
    let count = shard_count.max(1) as usize;
    let chunk = data.len().div_ceil(count);

    let mut shards: Vec<&[u8]> = if chunk == 0 {
        Vec::with_capacity(count)
    } else {
        data.chunks(chunk).collect()
    };
    shards.resize(count, &data[..0]);
    shards
}
