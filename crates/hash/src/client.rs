//! Hash store seam

use crate::command::{HashCommand, HashReply};
use recmap_core::{CallContext, Result};

/// Executes [`HashCommand`]s against a key-value hash store
///
/// A [`HashCommand::ConditionalSet`] must check and write atomically with
/// respect to every other command on the same key. Implementations receive
/// the caller's context unchanged.
pub trait HashClient: Send + Sync {
    /// Short client name for logs
    fn client_name(&self) -> &'static str;

    /// Run one command
    fn execute(&self, ctx: &CallContext, cmd: &HashCommand) -> Result<HashReply>;
}
