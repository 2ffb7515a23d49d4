use std::fmt::{self, Display, Formatter};

use tabled::builder::Builder;
use tabled::settings::Style;

use super::painter::Painter;

/// Rounded table for channel listings and session reports.
#[derive(Debug, Default)]
pub(crate) struct Table {
    builder: Builder,
}

impl Table {
    pub(crate) fn grid<H, R>(headers: impl IntoIterator<Item = H>, rows: R) -> Self
    where
        H: Into<String>,
        R: IntoIterator<Item = Vec<String>>,
    {
        let mut builder = Builder::default();
        builder.push_record(headers.into_iter().map(Into::<String>::into));
        for row in rows {
            builder.push_record(row);
        }
        Self { builder }
    }

    /// Field names are muted so the values stand out.
    pub(crate) fn key_value(painter: &Painter, rows: Vec<(&str, String)>) -> Self {
        Self::grid(
            ["field", "value"],
            rows.into_iter()
                .map(|(field, value)| vec![painter.muted(field), value]),
        )
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut table = self.builder.clone().build();
        table.with(Style::rounded());
        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn key_value_rows_keep_their_order() {
        let painter = Painter::new(false);
        let table = Table::key_value(
            &painter,
            vec![
                ("readings", "12".into()),
                ("stop_reason", "interrupted by user".into()),
            ],
        );
        assert_snapshot!(table.to_string(), @r"
            ╭─────────────┬─────────────────────╮
            │ field       │ value               │
            ├─────────────┼─────────────────────┤
            │ readings    │ 12                  │
            │ stop_reason │ interrupted by user │
            ╰─────────────┴─────────────────────╯
        ");
    }

    #[test]
    fn grid_pads_columns_to_the_widest_cell() {
        let table = Table::grid(
            ["role", "uuid"],
            vec![
                vec!["control".into(), "306b0002".into()],
                vec!["bulk".into(), "306b0004".into()],
            ],
        );
        assert_snapshot!(table.to_string(), @r"
            ╭─────────┬──────────╮
            │ role    │ uuid     │
            ├─────────┼──────────┤
            │ control │ 306b0002 │
            │ bulk    │ 306b0004 │
            ╰─────────┴──────────╯
        ");
    }
}
