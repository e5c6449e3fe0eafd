//! Fixed-width text tables for console reports.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub header: &'static str,
    pub width: usize,
    pub align: Align,
}

impl Column {
    pub const fn left(header: &'static str, width: usize) -> Self {
        Self {
            header,
            width,
            align: Align::Left,
        }
    }

    pub const fn right(header: &'static str, width: usize) -> Self {
        Self {
            header,
            width,
            align: Align::Right,
        }
    }
}

/// Cut `value` to `width` characters, marking the cut with `…`.
pub fn truncate_cell(value: &str, width: usize) -> String {
    let single_line = value.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= width {
        return single_line;
    }
    if width == 0 {
        return String::new();
    }
    let mut out = single_line.chars().take(width - 1).collect::<String>();
    out.push('…');
    out
}

fn pad(value: &str, column: &Column) -> String {
    let cell = truncate_cell(value, column.width);
    match column.align {
        Align::Left => format!("{:<width$}", cell, width = column.width),
        Align::Right => format!("{:>width$}", cell, width = column.width),
    }
}

pub fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let header = columns
        .iter()
        .map(|column| pad(column.header, column))
        .collect::<Vec<String>>()
        .join(" | ");
    let rule = columns
        .iter()
        .map(|column| "-".repeat(column.width))
        .collect::<Vec<String>>()
        .join("-+-");

    let mut out = format!("{}\n{}\n", header.trim_end(), rule);
    for row in rows {
        let line = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| pad(row.get(idx).map(String::as_str).unwrap_or(""), column))
            .collect::<Vec<String>>()
            .join(" | ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fixed_width_rows() {
        let columns = [Column::left("Name", 6), Column::right("Score", 5)];
        let rows = vec![
            vec!["alpha".to_string(), "0.50".to_string()],
            vec!["a-very-long-name".to_string(), "1.00".to_string()],
        ];
        let table = render_table(&columns, &rows);
        let lines = table.lines().collect::<Vec<&str>>();
        assert_eq!(lines[0], "Name   | Score");
        assert_eq!(lines[1], "-------+------");
        assert_eq!(lines[2], "alpha  |  0.50");
        assert_eq!(lines[3], "a-ver… |  1.00");
    }
}
