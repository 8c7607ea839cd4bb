//! Element type tags carried by ring buffers.

/// Logical sample format carried by a ring buffer's elements.
///
/// Every concrete variant has a statically known byte size. `Invalid` means
/// "this endpoint produces or consumes nothing through this channel";
/// `Unknown` is diagnostic only and never appears on a bound ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementTag {
    /// Signed 8-bit integer.
    S8,
    /// Unsigned 8-bit integer.
    U8,
    /// Complex signed 8-bit integer (2 x i8).
    CS8,
    /// Signed 16-bit integer.
    S16,
    /// Unsigned 16-bit integer.
    U16,
    /// Complex signed 16-bit integer (2 x i16).
    CS16,
    /// Signed 32-bit integer.
    S32,
    /// Unsigned 32-bit integer.
    U32,
    /// 32-bit float.
    Float,
    /// Complex 32-bit float (2 x f32).
    CFloat,
    /// 64-bit float.
    Double,
    /// Complex 64-bit float (2 x f64).
    CDouble,
    /// Diagnostic-only sentinel; never a valid channel format.
    Unknown,
    /// No channel on this side.
    Invalid,
}

impl ElementTag {
    /// Size in bytes of one element of this tag. Zero for `Invalid`/`Unknown`.
    #[must_use]
    pub const fn byte_size(self) -> usize {
        match self {
            Self::S8 | Self::U8 => 1,
            Self::CS8 | Self::S16 | Self::U16 => 2,
            Self::CS16 | Self::S32 | Self::U32 | Self::Float => 4,
            Self::CFloat | Self::Double => 8,
            Self::CDouble => 16,
            Self::Unknown | Self::Invalid => 0,
        }
    }

    /// Returns `true` for the two sentinel variants (`Unknown`, `Invalid`).
    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        matches!(self, Self::Unknown | Self::Invalid)
    }
}
