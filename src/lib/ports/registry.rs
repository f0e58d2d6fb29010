use alloy_primitives::{Address, U256};

/// Read-only view of submitter registration and collateral.
///
/// Margin accounting lives outside this crate; a submitter qualifies while
/// its margin is non-zero.
pub trait SubmitterRegistry: Send + Sync {
    fn margin(&self, submitter: Address) -> U256;

    fn is_submitter(&self, submitter: Address) -> bool {
        !self.margin(submitter).is_zero()
    }
}

impl<T: SubmitterRegistry + ?Sized> SubmitterRegistry for std::sync::Arc<T> {
    fn margin(&self, submitter: Address) -> U256 {
        (**self).margin(submitter)
    }
}
