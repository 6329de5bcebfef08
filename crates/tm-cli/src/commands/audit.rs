use std::path::Path;

use anyhow::Result;
use tm_audit::{verify_hash_chain, VerifyResult};

/// `Ok((true, line))` for an intact chain, `Ok((false, line))` for a broken one.
pub fn verify(path: &Path) -> Result<(bool, String)> {
    Ok(match verify_hash_chain(path)? {
        VerifyResult::Valid { lines } => (true, format!("verify=valid lines={lines}")),
        VerifyResult::Broken { line, reason } => {
            (false, format!("verify=broken line={line} reason={reason}"))
        }
    })
}
