use crate::backends::Context;
use crate::progress::TerminalProgress;
use cirrus_cloud::terminate_stack;
use colored::Colorize;

pub async fn terminate(stack_name: &str) -> anyhow::Result<()> {
    let ctx = Context::load()?;
    let dns = ctx.dns()?;

    let mut progress = TerminalProgress::new();
    let outcome = terminate_stack(
        ctx.cloud.as_ref(),
        dns.as_ref(),
        stack_name,
        &ctx.delete_poll(),
        &mut progress,
    )
    .await?;

    for (instance, error) in &outcome.dns_failures {
        println!(
            "{} could not remove DNS records for {}: {}",
            "warning:".yellow(),
            instance,
            error
        );
    }

    tracing::debug!("Stack deletion confirmed by {:?}", outcome.signal);
    println!(
        "{} {} after {}s",
        "Deleted Stack".red(),
        outcome.stack_name,
        outcome.elapsed_secs
    );
    Ok(())
}
