/// Source of the host's current block number.
///
/// Implementations:
/// - `ManualClock` (in-memory, advanced by hand)
pub trait BlockClock: Send + Sync {
    fn current_block(&self) -> u64;
}

impl<T: BlockClock + ?Sized> BlockClock for &T {
    fn current_block(&self) -> u64 {
        (**self).current_block()
    }
}

impl<T: BlockClock + ?Sized> BlockClock for std::sync::Arc<T> {
    fn current_block(&self) -> u64 {
        (**self).current_block()
    }
}
