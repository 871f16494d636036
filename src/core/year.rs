use chrono::{DateTime, Datelike, Utc};
use std::collections::BTreeSet;

/// Calendar tax year (1 January to 31 December, UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxYear(pub i32);

impl TaxYear {
    pub fn from_date(date: DateTime<Utc>) -> Self {
        TaxYear(date.year())
    }

    pub fn display(&self) -> String {
        self.0.to_string()
    }
}

/// Set of tax years to include. Empty means every year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearFilter(BTreeSet<TaxYear>);

impl YearFilter {
    pub fn all() -> Self {
        YearFilter::default()
    }

    pub fn new<I>(years: I) -> Self
    where
        I: IntoIterator<Item = i32>,
    {
        YearFilter(years.into_iter().map(TaxYear).collect())
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        self.is_all() || self.0.contains(&TaxYear::from_date(date))
    }

    pub fn years(&self) -> impl Iterator<Item = TaxYear> + '_ {
        self.0.iter().copied()
    }

    pub fn display(&self) -> String {
        if self.is_all() {
            "All Years".to_string()
        } else {
            self.0
                .iter()
                .map(TaxYear::display)
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tax_year_from_date() {
        let d = Utc.with_ymd_and_hms(2022, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(TaxYear::from_date(d), TaxYear(2022));
        let d = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(TaxYear::from_date(d), TaxYear(2023));
    }

    #[test]
    fn tax_year_display() {
        assert_eq!(TaxYear(2022).display(), "2022");
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = YearFilter::all();
        assert!(filter.is_all());
        assert!(filter.contains(Utc.with_ymd_and_hms(1999, 6, 1, 0, 0, 0).unwrap()));
        assert_eq!(filter.display(), "All Years");
    }

    #[test]
    fn filter_is_inclusive_set_membership() {
        let filter = YearFilter::new([2021, 2023]);
        assert!(filter.contains(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()));
        assert!(!filter.contains(Utc.with_ymd_and_hms(2022, 7, 1, 0, 0, 0).unwrap()));
        assert!(filter.contains(Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap()));
        assert_eq!(filter.display(), "2021, 2023");
    }
}
