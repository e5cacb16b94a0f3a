//! Stack termination orchestration

use crate::dns::DnsRegistrar;
use crate::error::Result;
use crate::poll::{DeletionSignal, PollConfig, ProgressSink, wait_for_stack_deletion};
use crate::provider::Cloud;

/// Result of a completed stack termination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminateOutcome {
    /// Name captured before the delete; the handle is unusable afterwards
    pub stack_name: String,
    pub stack_id: String,
    pub signal: DeletionSignal,
    pub elapsed_secs: u64,
    /// Instances whose DNS records could not be removed, with the error
    pub dns_failures: Vec<(String, String)>,
}

/// Deregister DNS for every member, delete the stack and wait until the
/// provider confirms the delete or no longer knows the stack.
pub async fn terminate_stack(
    cloud: &dyn Cloud,
    dns: &dyn DnsRegistrar,
    stack_name: &str,
    poll: &PollConfig,
    progress: &mut dyn ProgressSink,
) -> Result<TerminateOutcome> {
    let mut stack = cloud.get_stack(stack_name).await?;
    let name = stack.name().to_string();
    let id = stack.id().to_string();

    let mut dns_failures = Vec::new();
    for instance in stack.get_instances().await? {
        if let Err(e) = instance.delete_dns_entries(dns).await {
            tracing::warn!("Failed to remove DNS records for {}: {}", instance.name(), e);
            dns_failures.push((instance.name().to_string(), e.to_string()));
        }
    }

    tracing::info!("Deleting stack {} ({})", name, id);
    stack.delete().await?;

    let deletion = wait_for_stack_deletion(stack.as_mut(), poll, progress).await?;
    tracing::info!("Stack {} deleted after {}s", name, deletion.elapsed.as_secs());

    Ok(TerminateOutcome {
        stack_name: name,
        stack_id: id,
        signal: deletion.signal,
        elapsed_secs: deletion.elapsed.as_secs(),
        dns_failures,
    })
}
