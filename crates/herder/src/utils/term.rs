use owo_colors::OwoColorize as _;

/// Render a plain-text table. Column widths fit the widest header or cell.
#[must_use]
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
  let cols = headers.len();
  let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
  for row in rows {
    for (i, cell) in row.iter().enumerate().take(cols) {
      widths[i] = widths[i].max(cell.chars().count());
    }
  }

  let mut lines = Vec::with_capacity(rows.len() + 1);
  lines.push(render_line(headers.iter().copied(), &widths));
  for row in rows {
    lines.push(render_line(row.iter().map(String::as_str), &widths));
  }
  lines
}

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
  let cols = widths.len();
  let mut line = String::new();
  for (i, text) in cells.enumerate().take(cols) {
    line.push_str(text);
    if i + 1 < cols {
      let spaces = widths[i].saturating_sub(text.chars().count()) + 1;
      line.push_str(&" ".repeat(spaces));
    }
  }
  line
}

/// Print a table to stdout with a dimmed header line.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
  let mut lines = render_table(headers, rows).into_iter();
  if let Some(header) = lines.next() {
    anstream::println!("{}", header.dimmed());
  }
  for line in lines {
    anstream::println!("{line}");
  }
}
