//! Date x tile table of the daily archives that exist remotely.

use std::collections::HashSet;

use chrono::NaiveDate;
use log::info;

use crate::{
    download::Fetch,
    error::ListingError,
    listing::list_tile_dates,
    tile::TileCode,
};

#[derive(Debug, Clone, PartialEq)]
/// One row per calendar day, one column per tile.
pub struct AvailabilityTable {
    tiles: Vec<TileCode>,
    rows: Vec<(NaiveDate, Vec<bool>)>,
}

impl AvailabilityTable {
    /// Builds the table over the continuous range from the earliest to the
    /// latest date of any tile. Days a tile does not list are `false`.
    pub fn from_tile_dates(tile_dates: Vec<(TileCode, Vec<NaiveDate>)>) -> Self {
        let tiles: Vec<TileCode> = tile_dates.iter().map(|(tile, _)| tile.clone()).collect();
        let sets: Vec<HashSet<NaiveDate>> = tile_dates
            .iter()
            .map(|(_, dates)| dates.iter().copied().collect())
            .collect();

        let first = sets.iter().flatten().min().copied();
        let last = sets.iter().flatten().max().copied();

        let rows = match (first, last) {
            (Some(first), Some(last)) => first
                .iter_days()
                .take_while(|date| *date <= last)
                .map(|date| (date, sets.iter().map(|set| set.contains(&date)).collect()))
                .collect(),
            _ => Vec::new(),
        };

        AvailabilityTable { tiles, rows }
    }

    pub fn tiles(&self) -> &[TileCode] {
        &self.tiles
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.iter().map(|(date, _)| *date)
    }

    pub fn rows(&self) -> &[(NaiveDate, Vec<bool>)] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn row(&self, date: NaiveDate) -> Option<&[bool]> {
        self.rows
            .binary_search_by_key(&date, |(d, _)| *d)
            .ok()
            .map(|i| self.rows[i].1.as_slice())
    }

    pub fn is_available(&self, date: NaiveDate, tile: &TileCode) -> bool {
        let Some(column) = self.tiles.iter().position(|t| t == tile) else {
            return false;
        };
        self.row(date).is_some_and(|row| row[column])
    }

    /// Tiles with an archive on `date`, in column order.
    pub fn available_tiles(&self, date: NaiveDate) -> Vec<&TileCode> {
        self.tiles
            .iter()
            .filter(|tile| self.is_available(date, tile))
            .collect()
    }

    pub fn available_count(&self, date: NaiveDate) -> usize {
        self.row(date)
            .map_or(0, |row| row.iter().filter(|&&present| present).count())
    }

    /// Drops the days on which no tile has an archive.
    pub fn without_empty_days(mut self) -> Self {
        self.rows.retain(|(_, row)| row.iter().any(|&present| present));
        self
    }

    /// Keeps only the days within `from..=to`; either bound may be open.
    pub fn within(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.rows.retain(|(date, _)| {
            from.map_or(true, |from| *date >= from) && to.map_or(true, |to| *date <= to)
        });
        self
    }
}

/// Reads the daily listing of every tile and builds the table.
pub async fn fetch_availability<F: Fetch + ?Sized>(
    fetcher: &F,
    daily_url: &str,
    tiles: &[TileCode],
) -> Result<AvailabilityTable, ListingError> {
    let mut tile_dates = Vec::with_capacity(tiles.len());

    for tile in tiles {
        let dates = list_tile_dates(fetcher, daily_url, tile).await?;
        info!("{}: {} daily archives listed", tile, dates.len());
        tile_dates.push((tile.clone(), dates));
    }

    Ok(AvailabilityTable::from_tile_dates(tile_dates))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 1, d).unwrap()
    }

    fn tile(code: &str) -> TileCode {
        code.parse().unwrap()
    }

    fn table_fixture() -> AvailabilityTable {
        AvailabilityTable::from_tile_dates(vec![
            (tile("080e030n"), vec![day(1), day(3)]),
            (tile("090e030n"), vec![day(3), day(6)]),
        ])
    }

    #[test]
    fn should_span_union_of_dates() {
        let table = table_fixture();

        assert_eq!(table.len(), 6);
        assert_eq!(table.dates().next(), Some(day(1)));
        assert_eq!(table.dates().last(), Some(day(6)));
    }

    #[test]
    fn should_default_missing_days_to_unavailable() {
        let table = table_fixture();

        assert_eq!(table.available_tiles(day(1)), vec![&tile("080e030n")]);
        assert!(table.available_tiles(day(2)).is_empty());
        assert!(table.available_tiles(day(20)).is_empty());
        assert!(table.is_available(day(1), &tile("080e030n")));
        assert!(!table.is_available(day(1), &tile("090e030n")));
        assert!(!table.is_available(day(1), &tile("070w010s")));
        assert_eq!(table.available_count(day(3)), 2);
        assert_eq!(table.available_tiles(day(6)), vec![&tile("090e030n")]);
    }

    #[test]
    fn should_drop_empty_days() {
        let table = table_fixture().without_empty_days();

        assert_eq!(table.dates().collect::<Vec<_>>(), vec![day(1), day(3), day(6)]);
        assert_eq!(table.tiles().len(), 2);
    }

    #[test]
    fn should_restrict_to_window() {
        let table = table_fixture().within(Some(day(2)), Some(day(5)));
        assert_eq!(table.dates().collect::<Vec<_>>(), vec![day(2), day(3), day(4), day(5)]);

        let open = table_fixture().within(None, Some(day(1)));
        assert_eq!(open.len(), 1);
    }

    #[test]
    fn should_build_empty_table_without_dates() {
        let table = AvailabilityTable::from_tile_dates(vec![(tile("080e030n"), vec![])]);

        assert!(table.is_empty());
        assert_eq!(table.available_count(day(1)), 0);
    }
}
