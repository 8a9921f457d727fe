use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, TransferResult};

pub const BRIDGE_LOADER_BEFORE_LOAD: &str = "bridge.loader.before_load";

pub fn transfer_fail_point(name: &str) -> TransferResult<()> {
    fail_point!(name, |parameter| {
        let mut error_kind = ErrorKind::InjectedFailure;
        if let Some(parameter) = parameter {
            error_kind = match parameter.as_str() {
                "destination" => ErrorKind::DestinationError,
                "invalid_data" => ErrorKind::InvalidData,
                _ => ErrorKind::InjectedFailure,
            }
        }

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
