use std::io;

use allquants_core::QuantizationProfile;
use console::{measure_text_width, pad_str, style, Alignment, Style, Term};

/// Table column definition
pub struct TableColumn {
    /// Column title
    pub title: String,

    /// Column width
    pub width: usize,

    /// Column style
    pub style: Option<Style>,
}

impl TableColumn {
    pub fn new(title: &str, width: usize, style: Option<Style>) -> Self {
        Self {
            title: title.to_string(),
            width,
            style,
        }
    }
}

/// Print a table to the terminal
pub fn print_table(columns: &[TableColumn], rows: &[Vec<String>]) -> io::Result<()> {
    let term = Term::stdout();
    for line in render_table(columns, rows) {
        term.write_line(&line)?;
    }
    Ok(())
}

fn render_table(columns: &[TableColumn], rows: &[Vec<String>]) -> Vec<String> {
    let mut lines = Vec::with_capacity(rows.len() + 2);

    let header: Vec<String> = columns
        .iter()
        .map(|c| style(pad_str(&c.title, c.width, Alignment::Left, None)).bold().to_string())
        .collect();
    lines.push(header.join("  "));

    let separator: Vec<String> = columns.iter().map(|c| "─".repeat(c.width)).collect();
    lines.push(separator.join("  "));

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .zip(row.iter())
            .map(|(column, value)| {
                // Truncate value if it's too long
                let cell = pad_str(value, column.width, Alignment::Left, Some("…"));
                match &column.style {
                    Some(style) => style.apply_to(cell).to_string(),
                    None => cell.into_owned(),
                }
            })
            .collect();
        lines.push(cells.join("  "));
    }

    lines
}

/// The `types` table: Type, Size, Speed, Quality, Recommended For.
pub fn print_profile_table(profiles: &[QuantizationProfile]) -> io::Result<()> {
    let rows = profile_rows(profiles);
    let width = |i: usize, title: &str| {
        rows.iter()
            .map(|r| measure_text_width(&r[i]))
            .chain(std::iter::once(title.len()))
            .max()
            .unwrap_or(0)
    };

    let columns = [
        TableColumn::new("Type", width(0, "Type"), Some(Style::new().cyan())),
        TableColumn::new("Size", width(1, "Size"), Some(Style::new().magenta())),
        TableColumn::new("Speed", width(2, "Speed"), Some(Style::new().green())),
        TableColumn::new("Quality", width(3, "Quality"), Some(Style::new().yellow())),
        TableColumn::new("Recommended For", width(4, "Recommended For"), None),
    ];

    Term::stdout().write_line(&style("Available Quantization Types").bold().to_string())?;
    print_table(&columns, &rows)
}

fn profile_rows(profiles: &[QuantizationProfile]) -> Vec<Vec<String>> {
    profiles
        .iter()
        .map(|p| {
            vec![
                p.name.to_string(),
                p.size.to_string(),
                p.speed.to_string(),
                p.quality.to_string(),
                p.recommended_for.to_string(),
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_rows_follow_catalog() {
        let rows = profile_rows(allquants_core::profiles());
        assert_eq!(rows.len(), 14);
        assert_eq!(rows[0][0], "Q2_K");
        assert_eq!(rows[13][0], "Q8_0");
        assert!(rows.iter().all(|r| r.len() == 5));
    }

    #[test]
    fn test_render_truncates_long_cells() {
        console::set_colors_enabled(false);
        let columns = [TableColumn::new("Name", 6, None)];
        let lines = render_table(&columns, &[vec!["quantization".to_string()]]);
        assert_eq!(lines[0], "Name  ");
        assert_eq!(lines[1], "──────");
        assert_eq!(measure_text_width(&lines[2]), 6);
        assert!(lines[2].ends_with('…'));
    }
}
