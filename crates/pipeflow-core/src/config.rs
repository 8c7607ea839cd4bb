//! Configuration for ring buffers and stages.

/// Configuration for a `Ring`'s storage.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Capacity of the ring in elements. Power-of-two is recommended (cheap
    /// wrap arithmetic) but not required.
    pub capacity_elements: usize,
    /// Preferred element count per read/write attempt. Advisory only, not a
    /// framing boundary.
    pub chunk_size: usize,
}

impl Config {
    /// Creates a new configuration.
    ///
    /// # Panics
    ///
    /// Panics if `capacity_elements` or `chunk_size` is zero.
    #[must_use]
    pub const fn new(capacity_elements: usize, chunk_size: usize) -> Self {
        assert!(capacity_elements > 0, "capacity_elements must be > 0");
        assert!(chunk_size > 0, "chunk_size must be > 0");

        Self {
            capacity_elements,
            chunk_size,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity_elements: 1 << 16,
            chunk_size: 4096,
        }
    }
}

/// Preset tuned for low-latency pipelines: small ring, small chunks.
pub const LOW_LATENCY_CONFIG: Config = Config::new(1 << 12, 256);

/// Preset tuned for high-throughput pipelines: large ring, large chunks.
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::new(1 << 20, 65536);
