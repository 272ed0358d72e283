//! Inspection of per-command pipeline results.

use crate::errors::{RemovalError, Result};
use zero_users_storage::{CommandResult, Pipeline, StorageError};

/// Unwrap the results of an executed pipeline
///
/// Fails on the first command that reported an error, naming it. Commands
/// that already succeeded stay applied. A command the store sent no reply
/// for counts as failed.
pub(crate) fn check_pipeline(pipeline: &Pipeline, results: Vec<CommandResult>) -> Result<Vec<u64>> {
    let expected = pipeline.len();
    let received = results.len();
    if received > expected {
        return Err(StorageError::MissingReply { expected, received }.into());
    }

    let mut removed = Vec::with_capacity(received);

    for (index, (command, result)) in pipeline.commands().iter().zip(results).enumerate() {
        match result {
            Ok(count) => removed.push(count),
            Err(source) => {
                return Err(RemovalError::CommandFailed {
                    index,
                    command: command.to_string(),
                    source,
                })
            }
        }
    }

    if let Some(command) = pipeline.commands().get(received) {
        return Err(RemovalError::CommandFailed {
            index: received,
            command: command.to_string(),
            source: StorageError::MissingReply { expected, received },
        });
    }

    Ok(removed)
}
