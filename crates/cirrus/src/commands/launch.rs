use crate::LaunchArgs;
use crate::backends::Context;
use crate::progress::TerminalProgress;
use cirrus_cloud::{DnsConfigurator, LaunchRequest, Launcher};
use colored::Colorize;

pub async fn handle(args: LaunchArgs) -> anyhow::Result<()> {
    let ctx = Context::load()?;
    let dns = ctx.dns()?;
    let configurator = DnsConfigurator::new(dns.as_ref());
    let launcher = Launcher::new(ctx.cloud.as_ref(), &ctx.active.profile, &configurator)
        .with_poll(ctx.boot_poll());

    let request = LaunchRequest {
        env_type: args.env_type,
        size: args.size,
        availability_zone: args.availability_zone,
        security_groups: args.additional_security_groups,
        user_data: args.user_data,
        user_data_params: args.user_data_params,
        username: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
    };

    let mut progress = TerminalProgress::new();
    let instance = launcher.launch(&request, &mut progress).await?;

    println!("{} {}", "Created instance".green(), instance.name());
    Ok(())
}
