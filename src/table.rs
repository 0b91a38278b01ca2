//! Aligned plain-text tables for `preview`.

use std::{borrow::Cow, fmt};

const GAP: &str = "  ";
const ELLIPSIS: char = '…';

#[derive(Debug, Clone, Default)]
pub struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    max_width: Option<usize>,
}

impl TextTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
            max_width: None,
        }
    }

    /// Cells longer than `width` characters are cut and end in an ellipsis.
    pub fn with_max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width.max(1));
        self
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn cell<'a>(&self, value: &'a str) -> Cow<'a, str> {
        let flat: Cow<'a, str> = if value.contains(['\n', '\r', '\t']) {
            Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
        } else {
            Cow::Borrowed(value)
        };
        match self.max_width {
            Some(limit) if flat.chars().count() > limit => {
                let mut cut = flat.chars().take(limit - 1).collect::<String>();
                cut.push(ELLIPSIS);
                Cow::Owned(cut)
            }
            _ => flat,
        }
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths = self
            .headers
            .iter()
            .map(|h| self.cell(h).chars().count())
            .collect::<Vec<_>>();
        for row in &self.rows {
            for (idx, value) in row.iter().enumerate().take(widths.len()) {
                widths[idx] = widths[idx].max(self.cell(value).chars().count());
            }
        }
        widths.into_iter().map(|w| w.max(3)).collect()
    }

    fn write_line(&self, f: &mut fmt::Formatter<'_>, values: &[String], widths: &[usize]) -> fmt::Result {
        let mut line = String::new();
        for (idx, width) in widths.iter().enumerate() {
            if idx > 0 {
                line.push_str(GAP);
            }
            let text = values.get(idx).map(|v| self.cell(v)).unwrap_or_default();
            line.push_str(&text);
            let pad = width.saturating_sub(text.chars().count());
            line.extend(std::iter::repeat_n(' ', pad));
        }
        writeln!(f, "{}", line.trim_end())
    }
}

impl fmt::Display for TextTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        self.write_line(f, &self.headers, &widths)?;
        let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
        self.write_line(f, &rule, &widths)?;
        for row in &self.rows {
            self.write_line(f, row, &widths)?;
        }
        Ok(())
    }
}
