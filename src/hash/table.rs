// Content hash table used by the encoder to find COPY candidates.
//
// Each bucket holds a fixed number of window-buffer positions. Once a
// bucket is full, further positions for it are dropped rather than
// evicting older ones; this keeps per-bucket work bounded and the encoder
// deterministic.

use super::config::HashConfig;

/// Fixed-slot hash table over positions in a window buffer.
pub struct HashTable {
    cfg: HashConfig,
    num_buckets: usize,
    /// `buckets[b * slots_per_bucket + i]` = i-th position stored for bucket `b`.
    buckets: Vec<u32>,
    counts: Vec<u8>,
    /// End (exclusive) of the region stored positions may match into.
    limit: usize,
}

impl HashTable {
    /// Create a table sized for a region of `capacity` bytes.
    pub fn new(cfg: HashConfig, capacity: usize) -> Self {
        let num_buckets = cfg.num_buckets(capacity);
        Self {
            cfg,
            num_buckets,
            buckets: vec![0; num_buckets * cfg.slots_per_bucket],
            counts: vec![0; num_buckets],
            limit: 0,
        }
    }

    #[inline]
    pub fn key_size(&self) -> usize {
        self.cfg.key_size
    }

    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Empty every bucket and bound matches to `buffer[..limit]`.
    pub fn reset(&mut self, limit: usize) {
        self.counts.fill(0);
        self.limit = limit;
    }

    /// Bernstein hash of `key`, reduced to a bucket index.
    #[inline]
    pub fn hash(&self, key: &[u8]) -> usize {
        let h = if key.len() == 4 {
            let mut h = u32::from(key[0]);
            h = h.wrapping_mul(33).wrapping_add(u32::from(key[1]));
            h = h.wrapping_mul(33).wrapping_add(u32::from(key[2]));
            h.wrapping_mul(33).wrapping_add(u32::from(key[3]))
        } else {
            key.iter()
                .fold(0u32, |h, &b| h.wrapping_mul(33).wrapping_add(u32::from(b)))
        };
        h as usize % self.num_buckets
    }

    /// Bucket for the key starting at `buffer[position]`.
    #[inline]
    pub fn bucket_at(&self, buffer: &[u8], position: usize) -> usize {
        self.hash(&buffer[position..position + self.cfg.key_size])
    }

    /// Store `position` in `bucket` unless the bucket is already full.
    #[inline]
    pub fn add(&mut self, bucket: usize, position: usize) {
        let count = usize::from(self.counts[bucket]);
        if count < self.cfg.slots_per_bucket {
            self.buckets[bucket * self.cfg.slots_per_bucket + count] = position as u32;
            self.counts[bucket] += 1;
        }
    }

    /// Longest match for `buffer[position..]` among the positions in `bucket`.
    ///
    /// Candidates are compared forward without running past this table's
    /// limit, and the probe without running past the end of `buffer`.
    /// Returns `(candidate, length)` when the best length reaches `min_len`.
    pub fn find_match(
        &self,
        buffer: &[u8],
        bucket: usize,
        position: usize,
        min_len: usize,
    ) -> Option<(usize, usize)> {
        let count = usize::from(self.counts[bucket]);
        let base = bucket * self.cfg.slots_per_bucket;
        let probe = &buffer[position..];

        let mut best_pos = 0;
        let mut best_len = 0;
        for &slot in &self.buckets[base..base + count] {
            let candidate = slot as usize;
            if candidate >= self.limit || candidate >= position {
                continue;
            }
            let max_len = (self.limit - candidate).min(probe.len());
            let len = buffer[candidate..candidate + max_len]
                .iter()
                .zip(probe)
                .take_while(|(a, b)| a == b)
                .count();
            if len > best_len {
                best_pos = candidate;
                best_len = len;
                if best_len >= self.cfg.enough {
                    break;
                }
            }
        }

        (best_len >= min_len).then_some((best_pos, best_len))
    }

    /// Index `buffer[..region_end]` every `step_size` bytes, skipping keys
    /// that are one repeated byte.
    pub fn populate(&mut self, buffer: &[u8], region_end: usize) {
        let key = self.cfg.key_size;
        if region_end < key {
            return;
        }
        for position in (0..=region_end - key).step_by(self.cfg.step_size) {
            let window = &buffer[position..position + key];
            if is_run(window) {
                continue;
            }
            let bucket = self.hash(window);
            self.add(bucket, position);
        }
    }
}

/// Whether every byte of `key` is the same.
#[inline]
pub fn is_run(key: &[u8]) -> bool {
    key.split_first()
        .is_none_or(|(&first, rest)| rest.iter().all(|&b| b == first))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
