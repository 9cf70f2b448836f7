use crate::{SequenceConfig, StoreError};

mod interface;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
#[cfg(test)]
mod tests;

pub use interface::*;
pub use memory::*;
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
#[cfg(feature = "sqlite")]
pub use sqlite::*;

/// Invariants every backend enforces on `create`.
fn validate(config: &SequenceConfig) -> Result<(), StoreError> {
    if config.zero_padding == 0 {
        return Err(StoreError::InvalidConfig {
            key: config.key(),
            reason: "zero_padding must be at least 1".to_string(),
        });
    }
    Ok(())
}
