use crate::error::RowError;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Position of a row within its video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Order {
    First,
    Second,
    Third,
}

impl Order {
    pub fn label(self) -> &'static str {
        match self {
            Order::First => "1",
            Order::Second => "2",
            Order::Third => "3",
        }
    }
}

impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Order::First),
            "2" => Ok(Order::Second),
            "3" => Ok(Order::Third),
            other => Err(other.to_string()),
        }
    }
}

/// Image category a row refers to; each maps to one file in the input folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Crying,
    Confused,
    Shocked,
    Tongue,
    Goofy,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Crying,
        Category::Confused,
        Category::Shocked,
        Category::Tongue,
        Category::Goofy,
    ];

    /// Lowercase token looked for in image filenames.
    pub fn token(self) -> &'static str {
        match self {
            Category::Crying => "crying",
            Category::Confused => "confused",
            Category::Shocked => "shocked",
            Category::Tongue => "tongue",
            Category::Goofy => "goofy",
        }
    }

    pub fn sheet_label(self) -> &'static str {
        match self {
            Category::Crying => "Crying",
            Category::Confused => "Confused",
            Category::Shocked => "Shocked",
            Category::Tongue => "Tongue",
            Category::Goofy => "Goofy",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.sheet_label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| wanted.to_string())
    }
}

/// String cells of one data row, as read from the sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub used: String,
    pub mentions_toffee: String,
    pub kind: String,
    pub order: String,
    pub overlay_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based sheet row; the header occupies row 1.
    pub row_number: usize,
    pub used: bool,
    /// `Err` keeps the offending cell so the row still occupies its slot.
    pub order: Result<Order, RowError>,
    pub category: Result<Category, RowError>,
    pub overlay_text: String,
    pub mentions_toffee: String,
}

impl Row {
    /// Builds a row from its cells; `index` is the 0-based data row index.
    ///
    /// Only a literal `FALSE` (any case) counts as unused. Empty or odd values
    /// are treated as used.
    pub fn from_raw(index: usize, raw: RawRow) -> Self {
        let row_number = index + 2;
        let used = !raw.used.trim().eq_ignore_ascii_case("FALSE");
        let order = raw.order.parse::<Order>().map_err(|value| RowError::InvalidOrder {
            row: row_number,
            value,
        });
        let category = raw
            .kind
            .parse::<Category>()
            .map_err(|value| RowError::UnknownCategory {
                row: row_number,
                value,
            });

        Self {
            row_number,
            used,
            order,
            category,
            overlay_text: raw.overlay_text.trim().to_string(),
            mentions_toffee: raw.mentions_toffee.trim().to_string(),
        }
    }

    pub fn order_label(&self) -> String {
        match &self.order {
            Ok(order) => order.label().to_string(),
            Err(RowError::InvalidOrder { value, .. }) => value.clone(),
            Err(other) => other.to_string(),
        }
    }

    pub fn type_label(&self) -> String {
        match &self.category {
            Ok(category) => category.sheet_label().to_string(),
            Err(RowError::UnknownCategory { value, .. }) => value.clone(),
            Err(other) => other.to_string(),
        }
    }
}

/// Three rows ordered 1, 2, 3 that make up one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    rows: [Row; 3],
}

impl Sequence {
    pub fn rows(&self) -> &[Row; 3] {
        &self.rows
    }

    pub fn row_numbers(&self) -> [usize; 3] {
        [
            self.rows[0].row_number,
            self.rows[1].row_number,
            self.rows[2].row_number,
        ]
    }

    fn from_window(window: &[&Row]) -> Option<Self> {
        let [a, b, c] = window else {
            return None;
        };
        let mut orders = [a.order.clone().ok()?, b.order.clone().ok()?, c.order.clone().ok()?];
        orders.sort();
        if orders != [Order::First, Order::Second, Order::Third] {
            return None;
        }

        let mut rows = [(*a).clone(), (*b).clone(), (*c).clone()];
        rows.sort_by_key(|r| r.order.clone().ok());
        Some(Self { rows })
    }
}

/// First window of three consecutive unused rows carrying orders 1, 2, 3.
pub fn select_next_sequence(rows: &[Row]) -> Option<Sequence> {
    select_next_sequence_skipping(rows, &HashSet::new())
}

/// Like [`select_next_sequence`], but passes over any window holding a row
/// number listed in `skip`. Skipped rows still occupy their window slots.
///
/// Windows slide over the unused rows only, so a used row between two unused
/// rows does not break a window.
pub fn select_next_sequence_skipping(rows: &[Row], skip: &HashSet<usize>) -> Option<Sequence> {
    let unused: Vec<&Row> = rows.iter().filter(|r| !r.used).collect();

    unused
        .windows(3)
        .filter(|window| !window.iter().any(|r| skip.contains(&r.row_number)))
        .find_map(Sequence::from_window)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, used: &str, order: &str) -> Row {
        Row::from_raw(
            index,
            RawRow {
                used: used.to_string(),
                kind: "Crying".to_string(),
                order: order.to_string(),
                overlay_text: format!("caption {index}"),
                ..RawRow::default()
            },
        )
    }

    fn table(cells: &[(&str, &str)]) -> Vec<Row> {
        cells
            .iter()
            .enumerate()
            .map(|(i, (used, order))| row(i, used, order))
            .collect()
    }

    #[test]
    fn row_number_accounts_for_header() {
        assert_eq!(row(0, "FALSE", "1").row_number, 2);
        assert_eq!(row(9, "FALSE", "1").row_number, 11);
    }

    #[test]
    fn only_literal_false_is_unused() {
        assert!(!row(0, "FALSE", "1").used);
        assert!(!row(0, " false ", "1").used);
        assert!(row(0, "TRUE", "1").used);
        assert!(row(0, "", "1").used);
        assert!(row(0, "no", "1").used);
        assert!(row(0, "0", "1").used);
    }

    #[test]
    fn malformed_cells_become_row_errors() {
        let r = Row::from_raw(
            3,
            RawRow {
                used: "FALSE".into(),
                kind: "Sleepy".into(),
                order: "4".into(),
                ..RawRow::default()
            },
        );
        assert_eq!(
            r.order,
            Err(RowError::InvalidOrder {
                row: 5,
                value: "4".into()
            })
        );
        assert_eq!(
            r.category,
            Err(RowError::UnknownCategory {
                row: 5,
                value: "Sleepy".into()
            })
        );
        assert_eq!(r.order_label(), "4");
        assert_eq!(r.type_label(), "Sleepy");
    }

    #[test]
    fn category_parse_ignores_case() {
        assert_eq!(" goofy ".parse::<Category>(), Ok(Category::Goofy));
        assert_eq!("TONGUE".parse::<Category>(), Ok(Category::Tongue));
        assert!("".parse::<Category>().is_err());
    }

    #[test]
    fn first_window_is_selected_and_sorted() {
        let rows = table(&[("FALSE", "2"), ("FALSE", "1"), ("FALSE", "3"), ("FALSE", "1")]);
        let seq = select_next_sequence(&rows).unwrap();
        assert_eq!(seq.row_numbers(), [3, 2, 4]);
        let orders: Vec<Order> = seq.rows().iter().map(|r| r.order.clone().unwrap()).collect();
        assert_eq!(orders, vec![Order::First, Order::Second, Order::Third]);
    }

    #[test]
    fn duplicate_orders_are_rejected() {
        let rows = table(&[("FALSE", "1"), ("FALSE", "1"), ("FALSE", "2")]);
        assert_eq!(select_next_sequence(&rows), None);
    }

    #[test]
    fn used_rows_do_not_break_windows() {
        let rows = table(&[("FALSE", "1"), ("TRUE", "2"), ("FALSE", "2"), ("FALSE", "3")]);
        let seq = select_next_sequence(&rows).unwrap();
        assert_eq!(seq.row_numbers(), [2, 4, 5]);
    }

    #[test]
    fn windows_are_contiguous_not_combinatorial() {
        // orders 1, 2, 3 exist among the unused rows but never adjacently
        let rows = table(&[
            ("FALSE", "1"),
            ("FALSE", "1"),
            ("FALSE", "2"),
            ("FALSE", "2"),
            ("FALSE", "3"),
            ("FALSE", "3"),
        ]);
        assert_eq!(select_next_sequence(&rows), None);
    }

    #[test]
    fn later_window_is_found() {
        let rows = table(&[("FALSE", "1"), ("FALSE", "1"), ("FALSE", "3"), ("FALSE", "2")]);
        assert_eq!(select_next_sequence(&rows).unwrap().row_numbers(), [3, 5, 4]);
    }

    #[test]
    fn malformed_order_occupies_a_slot() {
        let rows = table(&[("FALSE", "1"), ("FALSE", "2"), ("FALSE", "x"), ("FALSE", "3")]);
        assert_eq!(select_next_sequence(&rows), None);
    }

    #[test]
    fn unused_filter_treats_blank_as_used() {
        let rows = table(&[("FALSE", "1"), ("", "9"), ("FALSE", "2"), ("FALSE", "3")]);
        assert_eq!(select_next_sequence(&rows).unwrap().row_numbers(), [2, 4, 5]);
    }

    #[test]
    fn too_few_rows_yield_nothing() {
        assert_eq!(select_next_sequence(&[]), None);
        let rows = table(&[("FALSE", "1"), ("FALSE", "2"), ("TRUE", "3")]);
        assert_eq!(select_next_sequence(&rows), None);
    }

    #[test]
    fn skipped_windows_are_passed_over() {
        let rows = table(&[
            ("FALSE", "1"),
            ("FALSE", "2"),
            ("FALSE", "3"),
            ("FALSE", "1"),
            ("FALSE", "2"),
            ("FALSE", "3"),
        ]);
        // overlapping windows through rows 3 and 4 are skipped too
        let skip: HashSet<usize> = [2, 3, 4].into_iter().collect();
        let seq = select_next_sequence_skipping(&rows, &skip).unwrap();
        assert_eq!(seq.row_numbers(), [5, 6, 7]);
    }
}
