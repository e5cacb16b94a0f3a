//! Polling loops for instance boot and stack deletion
//!
//! Providers push no status events, so both waits re-read the resource on a
//! fixed interval. The loops are bounded by a deadline and report each tick
//! through a [`ProgressSink`], which keeps them testable without a terminal.

use crate::error::{CloudError, Result};
use crate::instance::Instance;
use crate::stack::{Stack, StackView};
use cirrus_config::PollSettings;
use std::time::Duration;
use tokio::time::sleep;

/// Interval and deadline of a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::boot(&PollSettings::default())
    }
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }

    pub fn boot(settings: &PollSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.interval_secs),
            Some(Duration::from_secs(settings.boot_timeout_secs)),
        )
    }

    pub fn delete(settings: &PollSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.interval_secs),
            Some(Duration::from_secs(settings.delete_timeout_secs)),
        )
    }

    /// A zero interval never advances the wait clock, so no deadline would apply
    pub fn check(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(CloudError::Configuration(
                "poll interval must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    fn expired(&self, elapsed: Duration) -> bool {
        self.timeout.is_some_and(|t| elapsed >= t)
    }
}

/// Receives progress from the waits
pub trait ProgressSink: Send {
    fn instance_created(&mut self, _id: &str, _name: &str) {}

    /// Instance not running yet, `elapsed_secs` into the wait
    fn booting(&mut self, status: &str, elapsed_secs: u64);

    /// Instance reached its running state
    fn booted(&mut self, status: &str, elapsed_secs: u64);

    fn stack_deleting(&mut self, view: &StackView);
}

pub fn boot_tick_line(status: &str, elapsed_secs: u64) -> String {
    format!("{}... {}s", status, elapsed_secs)
}

pub fn boot_done_line(status: &str, elapsed_secs: u64) -> String {
    format!("{} after {}s", status, elapsed_secs)
}

/// Sink that keeps everything it is told, for tests and scripted callers
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    pub created: Vec<String>,
    pub lines: Vec<String>,
    pub stack_views: Vec<StackView>,
}

impl ProgressSink for RecordingProgress {
    fn instance_created(&mut self, id: &str, _name: &str) {
        self.created.push(id.to_string());
    }

    fn booting(&mut self, status: &str, elapsed_secs: u64) {
        self.lines.push(boot_tick_line(status, elapsed_secs));
    }

    fn booted(&mut self, status: &str, elapsed_secs: u64) {
        self.lines.push(boot_done_line(status, elapsed_secs));
    }

    fn stack_deleting(&mut self, view: &StackView) {
        self.stack_views.push(view.clone());
    }
}

/// Next action of the boot-wait for an observed status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStep {
    Running,
    Failed,
    Pending,
}

pub fn boot_step(status: &str, running_state: &str, failed_states: &[&str]) -> BootStep {
    if status == running_state {
        BootStep::Running
    } else if failed_states.contains(&status) {
        BootStep::Failed
    } else {
        BootStep::Pending
    }
}

/// Poll until the instance is running. Returns the time spent waiting.
///
/// Never re-issues the create call; a terminal failure status or the
/// deadline ends the wait with an error.
pub async fn wait_for_boot(
    instance: &mut dyn Instance,
    config: &PollConfig,
    progress: &mut dyn ProgressSink,
) -> Result<Duration> {
    config.check()?;
    let mut elapsed = Duration::ZERO;

    loop {
        let status = instance.update().await?;
        match boot_step(&status, instance.running_state(), instance.failed_states()) {
            BootStep::Running => {
                progress.booted(&status, elapsed.as_secs());
                return Ok(elapsed);
            }
            BootStep::Failed => {
                return Err(CloudError::Failed {
                    what: format!("Instance {}", instance.name()),
                    status,
                });
            }
            BootStep::Pending => {}
        }

        if config.expired(elapsed) {
            return Err(CloudError::Timeout {
                what: format!("instance {} to boot", instance.name()),
                waited_secs: elapsed.as_secs(),
            });
        }

        elapsed += config.interval;
        tracing::debug!("{} is {} ({}s)", instance.name(), status, elapsed.as_secs());
        progress.booting(&status, elapsed.as_secs());
        sleep(config.interval).await;
    }
}

/// What confirmed a stack deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionSignal {
    /// The provider reported the delete as complete
    Complete,
    /// The stack could no longer be read
    Gone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deletion {
    pub signal: DeletionSignal,
    pub elapsed: Duration,
}

/// Poll until a deleted stack is complete or gone.
///
/// `ResourceGone` from the refresh is the provider having removed the stack
/// and counts as success here, and only here.
pub async fn wait_for_stack_deletion(
    stack: &mut dyn Stack,
    config: &PollConfig,
    progress: &mut dyn ProgressSink,
) -> Result<Deletion> {
    config.check()?;
    let mut elapsed = Duration::ZERO;

    loop {
        match stack.refresh().await {
            Ok(()) => {}
            Err(e) if e.is_gone() => {
                tracing::debug!("Stack {} is gone", stack.name());
                return Ok(Deletion {
                    signal: DeletionSignal::Gone,
                    elapsed,
                });
            }
            Err(e) => return Err(e),
        }

        if stack.is_complete() {
            return Ok(Deletion {
                signal: DeletionSignal::Complete,
                elapsed,
            });
        }
        if stack.is_failed() {
            return Err(CloudError::Failed {
                what: format!("Stack {}", stack.name()),
                status: stack.status().to_string(),
            });
        }

        progress.stack_deleting(&StackView::capture(stack, elapsed.as_secs()));

        if config.expired(elapsed) {
            return Err(CloudError::Timeout {
                what: format!("stack {} to be deleted", stack.name()),
                waited_secs: elapsed.as_secs(),
            });
        }

        sleep(config.interval).await;
        elapsed += config.interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCloud, StackScript};
    use crate::provider::Cloud;
    use crate::stack::StackResource;

    fn one_second(timeout: Option<u64>) -> PollConfig {
        PollConfig::new(Duration::from_secs(1), timeout.map(Duration::from_secs))
    }

    #[test]
    fn test_boot_step() {
        assert_eq!(boot_step("ACTIVE", "ACTIVE", &["ERROR"]), BootStep::Running);
        assert_eq!(boot_step("ERROR", "ACTIVE", &["ERROR"]), BootStep::Failed);
        assert_eq!(boot_step("BUILD", "ACTIVE", &["ERROR"]), BootStep::Pending);
        assert_eq!(boot_step("SOMETHING_NEW", "ACTIVE", &["ERROR"]), BootStep::Pending);
        assert_eq!(boot_step("active", "ACTIVE", &[]), BootStep::Pending);
    }

    #[test]
    fn test_progress_lines() {
        assert_eq!(boot_tick_line("BUILD", 3), "BUILD... 3s");
        assert_eq!(boot_done_line("ACTIVE", 3), "ACTIVE after 3s");
    }

    #[test]
    fn test_poll_config_from_settings() {
        let settings = PollSettings {
            interval_secs: 2,
            boot_timeout_secs: 60,
            delete_timeout_secs: 120,
        };
        assert_eq!(PollConfig::boot(&settings).timeout, Some(Duration::from_secs(60)));
        assert_eq!(PollConfig::delete(&settings).timeout, Some(Duration::from_secs(120)));
        assert_eq!(PollConfig::delete(&settings).interval, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_rejected_before_polling() {
        let cloud = MockCloud::new("RegionOne");
        let id = cloud.add_server("prod-web-001", "mock-az", &[], "BUILD");
        cloud.script_status(&id, &["BUILD"; 50]);
        let mut instance = cloud.instance(&id).unwrap();
        let mut progress = RecordingProgress::default();
        let config = PollConfig::boot(&PollSettings {
            interval_secs: 0,
            boot_timeout_secs: 5,
            delete_timeout_secs: 5,
        });

        let err = wait_for_boot(instance.as_mut(), &config, &mut progress)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Configuration(_)));
        assert_eq!(cloud.count_calls("get_server"), 0);
        assert!(progress.lines.is_empty());

        cloud.add_stack("shop", &[], vec![], &[]);
        let mut stack = cloud.get_stack("shop").await.unwrap();
        let err = wait_for_stack_deletion(stack.as_mut(), &config, &mut progress)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Configuration(_)));
        assert_eq!(cloud.count_calls("get_stack"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_wait_scripted_sequence() {
        let cloud = MockCloud::new("RegionOne");
        let id = cloud.add_server("prod-web-001", "mock-az", &[], "BUILD");
        cloud.script_status(&id, &["BUILD", "BUILD", "ACTIVE"]);
        let mut instance = cloud.instance(&id).unwrap();
        let mut progress = RecordingProgress::default();

        let waited = wait_for_boot(instance.as_mut(), &one_second(None), &mut progress)
            .await
            .unwrap();

        assert_eq!(progress.lines, vec!["BUILD... 1s", "BUILD... 2s", "ACTIVE after 2s"]);
        assert_eq!(waited, Duration::from_secs(2));
        assert!(instance.is_running());
        assert_eq!(cloud.count_calls("get_server"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_wait_already_running() {
        let cloud = MockCloud::new("RegionOne");
        let id = cloud.add_server("prod-web-001", "mock-az", &[], "ACTIVE");
        let mut instance = cloud.instance(&id).unwrap();
        let mut progress = RecordingProgress::default();

        wait_for_boot(instance.as_mut(), &one_second(Some(5)), &mut progress)
            .await
            .unwrap();
        assert_eq!(progress.lines, vec!["ACTIVE after 0s"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_wait_error_status_fails_fast() {
        let cloud = MockCloud::new("RegionOne");
        let id = cloud.add_server("prod-web-001", "mock-az", &[], "BUILD");
        cloud.script_status(&id, &["BUILD", "ERROR", "ACTIVE"]);
        let mut instance = cloud.instance(&id).unwrap();
        let mut progress = RecordingProgress::default();

        let err = wait_for_boot(instance.as_mut(), &one_second(None), &mut progress)
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::Failed { ref status, .. } if status == "ERROR"));
        assert_eq!(progress.lines, vec!["BUILD... 1s"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_wait_times_out() {
        let cloud = MockCloud::new("RegionOne");
        let id = cloud.add_server("prod-web-001", "mock-az", &[], "BUILD");
        let mut instance = cloud.instance(&id).unwrap();
        let mut progress = RecordingProgress::default();

        let err = wait_for_boot(instance.as_mut(), &one_second(Some(3)), &mut progress)
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::Timeout { waited_secs: 3, .. }));
        assert_eq!(progress.lines, vec!["BUILD... 1s", "BUILD... 2s", "BUILD... 3s"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_wait_elapsed_is_monotonic() {
        let cloud = MockCloud::new("RegionOne");
        let id = cloud.add_server("prod-web-001", "mock-az", &[], "BUILD");
        cloud.script_status(&id, &["BUILD", "BUILD", "BUILD", "BUILD", "ACTIVE"]);
        let mut instance = cloud.instance(&id).unwrap();
        let mut progress = RecordingProgress::default();

        wait_for_boot(
            instance.as_mut(),
            &PollConfig::new(Duration::from_secs(2), None),
            &mut progress,
        )
        .await
        .unwrap();

        assert_eq!(
            progress.lines,
            vec!["BUILD... 2s", "BUILD... 4s", "BUILD... 6s", "BUILD... 8s", "ACTIVE after 8s"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stack_deletion_gone_is_success() {
        let cloud = MockCloud::new("RegionOne");
        cloud.add_stack(
            "shop",
            &[],
            vec![StackResource::new("srv-9", "Web", "DELETE_IN_PROGRESS")],
            &[
                StackScript::Status("DELETE_IN_PROGRESS"),
                StackScript::Status("DELETE_IN_PROGRESS"),
                StackScript::Gone,
            ],
        );
        let mut stack = cloud.get_stack("shop").await.unwrap();
        stack.delete().await.unwrap();
        let mut progress = RecordingProgress::default();

        let deletion = wait_for_stack_deletion(stack.as_mut(), &one_second(None), &mut progress)
            .await
            .unwrap();

        assert_eq!(deletion.signal, DeletionSignal::Gone);
        assert_eq!(deletion.elapsed, Duration::from_secs(2));
        let elapsed: Vec<u64> = progress.stack_views.iter().map(|v| v.elapsed_secs).collect();
        assert_eq!(elapsed, vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stack_deletion_complete() {
        let cloud = MockCloud::new("RegionOne");
        cloud.add_stack(
            "shop",
            &[],
            vec![],
            &[StackScript::Status("DELETE_IN_PROGRESS"), StackScript::Status("DELETE_COMPLETE")],
        );
        let mut stack = cloud.get_stack("shop").await.unwrap();
        let mut progress = RecordingProgress::default();

        let deletion = wait_for_stack_deletion(stack.as_mut(), &one_second(None), &mut progress)
            .await
            .unwrap();
        assert_eq!(deletion.signal, DeletionSignal::Complete);
        assert_eq!(progress.stack_views.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stack_view_sorted_by_logical_id() {
        let cloud = MockCloud::new("RegionOne");
        cloud.add_stack(
            "shop",
            &[],
            vec![
                StackResource::new("srv-2", "Web", "DELETE_IN_PROGRESS"),
                StackResource::new("net-1", "Network", "DELETE_COMPLETE"),
                StackResource::new("srv-1", "Db", "DELETE_IN_PROGRESS"),
            ],
            &[StackScript::Status("DELETE_IN_PROGRESS"), StackScript::Gone],
        );
        let mut stack = cloud.get_stack("shop").await.unwrap();
        let mut progress = RecordingProgress::default();

        wait_for_stack_deletion(stack.as_mut(), &one_second(None), &mut progress)
            .await
            .unwrap();

        let logical: Vec<&str> = progress.stack_views[0]
            .resources
            .iter()
            .map(|r| r.logical_id.as_str())
            .collect();
        assert_eq!(logical, vec!["Db", "Network", "Web"]);
        assert_eq!(progress.stack_views[0].name, "shop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stack_deletion_failed_status() {
        let cloud = MockCloud::new("RegionOne");
        cloud.add_stack("shop", &[], vec![], &[StackScript::Status("DELETE_FAILED")]);
        let mut stack = cloud.get_stack("shop").await.unwrap();
        let mut progress = RecordingProgress::default();

        let err = wait_for_stack_deletion(stack.as_mut(), &one_second(None), &mut progress)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stack_deletion_times_out() {
        let cloud = MockCloud::new("RegionOne");
        cloud.add_stack("shop", &[], vec![], &[]);
        let mut stack = cloud.get_stack("shop").await.unwrap();
        stack.delete().await.unwrap();
        let mut progress = RecordingProgress::default();

        let err = wait_for_stack_deletion(stack.as_mut(), &one_second(Some(2)), &mut progress)
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Timeout { waited_secs: 2, .. }));
        assert_eq!(progress.stack_views.len(), 3);
    }
}
