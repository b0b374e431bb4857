/// Errors raised by the core analysis routines.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("failed to allocate {bytes} bytes for {what}")]
    Allocation { what: &'static str, bytes: u64 },
}

/// Allocate a zero-initialized buffer of `len` elements, reporting
/// exhaustion instead of aborting.
pub(crate) fn try_alloc<T: Clone>(
    what: &'static str,
    len: usize,
    value: T,
) -> Result<Vec<T>, CoreError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| CoreError::Allocation {
        what,
        bytes: (len as u64).saturating_mul(std::mem::size_of::<T>() as u64),
    })?;
    buf.resize(len, value);
    Ok(buf)
}

/// Allocate `len` zeroed atomic counters.
pub(crate) fn try_alloc_atomic(
    what: &'static str,
    len: usize,
) -> Result<Vec<std::sync::atomic::AtomicU32>, CoreError> {
    use std::sync::atomic::AtomicU32;

    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| CoreError::Allocation {
        what,
        bytes: (len as u64).saturating_mul(4),
    })?;
    buf.extend((0..len).map(|_| AtomicU32::new(0)));
    Ok(buf)
}
