//! Termination of a single victim.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::TerminationError;
use crate::events::{object_reference, EventEmitter, EventKind};
use crate::instance::Instance;
use crate::store::InstanceStore;

pub const KILL_REASON: &str = "Killing";
pub const KILL_MESSAGE: &str = "Pod was killed by kubethanos to restore balance.";

/// Deletes victims and records a `Killing` event for each one.
pub struct TerminationExecutor {
    store: Arc<dyn InstanceStore>,
    events: Arc<dyn EventEmitter>,
    dry_run: bool,
}

impl TerminationExecutor {
    pub fn new(store: Arc<dyn InstanceStore>, events: Arc<dyn EventEmitter>, dry_run: bool) -> Self {
        Self {
            store,
            events,
            dry_run,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Terminate `victim`. In dry-run mode this only logs.
    ///
    /// A reference failure is reported after the pod is already gone; the deletion
    /// is not rolled back.
    pub async fn terminate(&self, victim: &Instance) -> Result<(), TerminationError> {
        info!(
            namespace = %victim.namespace,
            name = %victim.name,
            dry_run = self.dry_run,
            "terminating pod"
        );

        if self.dry_run {
            return Ok(());
        }

        self.store
            .delete(&victim.namespace, &victim.name)
            .await
            .map_err(|source| TerminationError::Delete {
                namespace: victim.namespace.clone(),
                name: victim.name.clone(),
                source,
            })?;

        let reference =
            object_reference(victim).map_err(|reason| TerminationError::Reference {
                namespace: victim.namespace.clone(),
                name: victim.name.clone(),
                reason,
            })?;

        if let Err(e) = self
            .events
            .record_event(&reference, EventKind::Normal, KILL_REASON, KILL_MESSAGE)
            .await
        {
            warn!(
                namespace = %victim.namespace,
                name = %victim.name,
                error = %e,
                "Failed to record kill event"
            );
        }

        Ok(())
    }
}
