use crate::backends::Context;
use crate::{ConfigArgs, SecurityGroupsAction};
use cirrus_cloud::SecurityGroup;
use cirrus_config::{SecurityRuleSpec, Settings};
use colored::Colorize;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::collections::BTreeMap;

pub async fn handle(args: ConfigArgs) -> anyhow::Result<()> {
    if let Some(action) = args.security_groups {
        return security_groups(action).await;
    }

    let mut settings = Settings::load()?;

    if let Some(cloud) = &args.cloud {
        report(settings.set_cloud(cloud));
    }
    if let Some(region) = &args.region {
        report(settings.set_region(region));
    }
    if let Some(project) = &args.project {
        report(settings.set_project(project));
    }

    let selection = &settings.selection;
    println!("cloud: {}", display(&selection.cloud));
    println!("region: {}", display(&selection.region));
    println!("project: {}", display(&selection.project));
    Ok(())
}

fn report(result: cirrus_config::Result<()>) {
    if let Err(e) = result {
        println!("{}", e.to_string().red());
        println!();
    }
}

fn display(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(not set)")
}

async fn security_groups(action: SecurityGroupsAction) -> anyhow::Result<()> {
    let ctx = Context::load()?;

    if action == SecurityGroupsAction::Set {
        let report = ctx
            .cloud
            .create_security_groups(&ctx.active.profile.security_groups)
            .await?;
        for name in &report.created_groups {
            println!("{} {}", "Created security group".yellow(), name);
        }
        println!("{}", report);
    }

    for group in ctx.cloud.list_security_groups().await? {
        print!("{}", format_group(&group)?);
    }
    Ok(())
}

/// Group name followed by each rule as indented JSON with sorted keys
pub fn format_group(group: &SecurityGroup) -> anyhow::Result<String> {
    let mut out = format!("{}\n", group.name);
    for rule in &group.rules {
        out.push_str(&format_rule(rule)?);
        out.push('\n');
    }
    Ok(out)
}

fn format_rule(rule: &SecurityRuleSpec) -> anyhow::Result<String> {
    let fields: BTreeMap<String, serde_json::Value> =
        serde_json::from_value(serde_json::to_value(rule)?)?;

    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    fields.serialize(&mut serializer)?;
    Ok(String::from_utf8(buf)?)
}
