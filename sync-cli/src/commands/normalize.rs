//! Normalize and validate an address without connecting.

use anyhow::Result;
use sync_core::normalize;

/// Run the normalize command.
pub fn run(raw: &str) -> Result<()> {
    match normalize(raw) {
        Ok(address) => {
            println!("{}", address);
            Ok(())
        }
        Err(e) => anyhow::bail!("{:?} is not a valid address: {}", raw, e),
    }
}
