use std::io::{self, Write};

use console::{measure_text_width, style};

/// Print an informational message
pub fn print_info(message: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "{} {}", style("ℹ").cyan(), message);
}

/// Print a success message
pub fn print_success(message: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "{} {}", style("✓").green(), style(message).green());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "{} {}", style("⚠").yellow(), style(message).yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    let stderr = io::stderr();
    let mut handle = stderr.lock();
    let _ = writeln!(handle, "{} {}", style("Error:").red().bold(), message);
}

/// Print `lines` inside a box; the first line is the title.
pub fn print_panel(lines: &[String]) {
    let _ = io::stdout().lock().write_all(render_panel(lines).as_bytes());
}

fn render_panel(lines: &[String]) -> String {
    let width = lines.iter().map(|l| measure_text_width(l)).max().unwrap_or(0);
    let mut out = format!("╭{}╮\n", "─".repeat(width + 2));
    for line in lines {
        let pad = width - measure_text_width(line);
        out.push_str(&format!("│ {}{} │\n", line, " ".repeat(pad)));
    }
    out.push_str(&format!("╰{}╯\n", "─".repeat(width + 2)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_pads_to_widest_line() {
        let panel = render_panel(&["Title".to_string(), "a longer line".to_string()]);
        let rows: Vec<&str> = panel.lines().collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1], "│ Title         │");
        assert_eq!(rows[2], "│ a longer line │");
        assert!(rows
            .iter()
            .all(|r| r.chars().count() == rows[0].chars().count()));
    }
}
