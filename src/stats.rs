//! Loan counts per month for the dashboard chart.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use serde::Serialize;

use crate::models::Loan;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YearFilter {
    #[default]
    All,
    Year(i32),
}

impl YearFilter {
    fn admits(self, year: i32) -> bool {
        match self {
            YearFilter::All => true,
            YearFilter::Year(y) => y == year,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    pub year: i32,
    pub month: u32,
    /// e.g. `Jan 2024`
    pub label: String,
    pub count: usize,
}

/// Distinct years in which loans were made, ascending.
#[must_use]
pub fn loan_years(loans: &[Loan]) -> Vec<i32> {
    loans
        .iter()
        .map(|l| l.loan_date.year())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Number of loans made per calendar month, oldest month first.
///
/// Months without loans are omitted.
#[must_use]
pub fn loans_per_month(loans: &[Loan], filter: YearFilter) -> Vec<MonthlyCount> {
    let mut counts: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for loan in loans {
        let (year, month) = (loan.loan_date.year(), loan.loan_date.month());
        if filter.admits(year) {
            *counts.entry((year, month)).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|((year, month), count)| MonthlyCount {
            year,
            month,
            label: format!("{} {year}", MONTHS[month as usize - 1]),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::Id;

    fn loan(y: i32, m: u32, d: u32) -> Loan {
        let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        Loan {
            id: Id::from(format!("{y}{m}{d}")),
            member_id: Id::from(1),
            book_id: Id::from(1),
            loan_date: date,
            due_date: date,
            returned: false,
        }
    }

    #[test]
    fn groups_by_month_in_calendar_order() {
        let loans = [
            loan(2024, 3, 2),
            loan(2023, 12, 30),
            loan(2024, 1, 5),
            loan(2024, 1, 20),
        ];
        let months = loans_per_month(&loans, YearFilter::All);
        let labels: Vec<_> = months.iter().map(|m| (m.label.as_str(), m.count)).collect();
        assert_eq!(labels, [("Dec 2023", 1), ("Jan 2024", 2), ("Mar 2024", 1)]);
        assert_eq!(loan_years(&loans), [2023, 2024]);
    }

    #[test]
    fn year_filter_drops_other_years() {
        let loans = [loan(2023, 12, 30), loan(2024, 1, 5)];
        let months = loans_per_month(&loans, YearFilter::Year(2024));
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].label, "Jan 2024");
        assert!(loans_per_month(&loans, YearFilter::Year(2020)).is_empty());
    }
}
