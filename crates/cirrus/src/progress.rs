//! Terminal rendering of launch and stack deletion progress

use cirrus_cloud::StackView;
use cirrus_cloud::poll::{ProgressSink, boot_done_line, boot_tick_line};
use colored::Colorize;
use crossterm::{cursor, execute, terminal};
use std::io::{IsTerminal, Write};

/// Writes progress to stdout. Boot ticks rewrite one line; the stack view
/// redraws the whole screen when stdout is a terminal.
pub struct TerminalProgress {
    interactive: bool,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            interactive: std::io::stdout().is_terminal(),
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

pub fn render_stack_view(view: &StackView) -> String {
    let mut out = format!(
        "{}{}... {}s\n{}\n\n{}\n",
        "Deleting Stack ".red(),
        view.name,
        view.elapsed_secs,
        view.id,
        "Resources".red()
    );
    for resource in &view.resources {
        out.push_str(&format!(
            "\t{}\t{}\t{}\n",
            resource.physical_id, resource.logical_id, resource.status
        ));
    }
    out
}

impl ProgressSink for TerminalProgress {
    fn instance_created(&mut self, id: &str, _name: &str) {
        println!("{} {}", "Created instance".yellow(), id);
    }

    fn booting(&mut self, status: &str, elapsed_secs: u64) {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "\r{}", boot_tick_line(status, elapsed_secs));
        let _ = stdout.flush();
    }

    fn booted(&mut self, status: &str, elapsed_secs: u64) {
        println!("\r{}", boot_done_line(status, elapsed_secs));
    }

    fn stack_deleting(&mut self, view: &StackView) {
        let mut stdout = std::io::stdout();
        if self.interactive {
            let _ = execute!(
                stdout,
                terminal::Clear(terminal::ClearType::All),
                cursor::MoveTo(0, 0)
            );
        }
        let _ = write!(stdout, "{}", render_stack_view(view));
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_cloud::StackResource;

    #[test]
    fn test_render_stack_view() {
        colored::control::set_override(false);
        let view = StackView {
            name: "shop".into(),
            id: "8c1f".into(),
            status: "DELETE_IN_PROGRESS".into(),
            elapsed_secs: 4,
            resources: vec![
                StackResource::new("srv-1", "Db", "DELETE_IN_PROGRESS"),
                StackResource::new("", "Web", "DELETE_COMPLETE"),
            ],
        };

        assert_eq!(
            render_stack_view(&view),
            "Deleting Stack shop... 4s\n8c1f\n\nResources\n\
             \tsrv-1\tDb\tDELETE_IN_PROGRESS\n\
             \t\tWeb\tDELETE_COMPLETE\n"
        );
    }
}
