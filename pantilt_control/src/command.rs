//! Command ingestion: one inbound payload in, one response out.
//!
//! Decoding failures are answered on the originating connection and never
//! touch the shared state. A successful command reports the current position
//! at response time, not the target it just set.

use pantilt_common::command::{Response, decode_command};
use tracing::debug;

use crate::state::SharedPosition;

/// Apply one raw command to `shared` and build its response.
pub fn handle_command(shared: &SharedPosition, raw: &str) -> Response {
    match decode_command(raw) {
        Ok(update) => {
            if !update.is_empty() {
                let target = shared.set_target(update);
                debug!("Target set to ({:.2}, {:.2})", target.pan, target.tilt);
            }
            Response::ok(shared.get_position())
        }
        Err(e) => {
            debug!("Rejected command {raw:?}: {e}");
            Response::error(e)
        }
    }
}
