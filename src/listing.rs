//! Reads the provider's HTML directory listings.
//!
//! Links are recognised by the shape of their file name, not by position on
//! the page, so parent-directory and column-sort links are ignored without
//! any assumption about where the server puts them.

use chrono::NaiveDate;

use crate::{
    download::Fetch,
    error::ListingError,
    tile::{parse_julian, TileCode},
};

/// Returns the `href` value of every `<a>` tag in `html`, in document order.
pub fn extract_links(html: &str) -> Vec<String> {
    let lower = html.to_ascii_lowercase();
    let mut links = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = lower[cursor..].find("<a") {
        let tag_start = cursor + offset;
        let after_name = tag_start + 2;

        // `<abbr>`, `<area>` and friends are not anchors.
        let is_anchor = lower[after_name..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_whitespace());
        let tag_end = match lower[tag_start..].find('>') {
            Some(end) => tag_start + end,
            None => break,
        };
        cursor = tag_end + 1;

        if !is_anchor {
            continue;
        }
        if let Some(href) = attribute(&html[after_name..tag_end], &lower[after_name..tag_end], "href") {
            links.push(href);
        }
    }

    links
}

// Finds `name=value` inside a tag body. `lower` is `body` lowercased.
fn attribute(body: &str, lower: &str, name: &str) -> Option<String> {
    let mut search = 0;

    while let Some(offset) = lower[search..].find(name) {
        let start = search + offset;
        search = start + name.len();

        let preceded_by_space = lower[..start]
            .chars()
            .last()
            .map_or(true, |c| c.is_ascii_whitespace());
        let rest = lower[search..].trim_start();
        if !preceded_by_space || !rest.starts_with('=') {
            continue;
        }

        let value_start = body.len() - rest.len() + 1;
        let value = body[value_start..].trim_start();
        return match value.chars().next() {
            Some(quote @ ('"' | '\'')) => value[1..]
                .find(quote)
                .map(|end| value[1..1 + end].to_string()),
            Some(_) => Some(
                value
                    .split(|c: char| c.is_ascii_whitespace())
                    .next()
                    .unwrap_or_default()
                    .to_string(),
            ),
            None => None,
        };
    }

    None
}

/// The last path segment of a link, without query string or fragment.
pub fn file_name(link: &str) -> &str {
    let link = link.split(['?', '#']).next().unwrap_or_default();
    link.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

/// Dates of the daily archives `{YYYYDDD}_{tile}.zip` among `links`, sorted
/// and de-duplicated.
///
/// Links of any other shape are ignored; a matching link whose code is not a
/// real day is an error.
pub fn daily_archive_dates(links: &[String], tile: &TileCode) -> Result<Vec<NaiveDate>, ListingError> {
    let suffix = format!("_{}.zip", tile);
    let mut dates = Vec::new();

    for link in links {
        let name = file_name(link);
        let lower = name.to_ascii_lowercase();
        let Some(code) = lower.strip_suffix(&suffix) else {
            continue;
        };
        if code.len() != 7 || !code.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        let date = parse_julian(code).ok_or_else(|| ListingError::MalformedDate {
            code: code.to_string(),
            file: name.to_string(),
        })?;
        dates.push(date);
    }

    dates.sort();
    dates.dedup();

    Ok(dates)
}

/// File names of the GeoTIFFs among `links`.
pub fn geotiff_names(links: &[String]) -> Vec<String> {
    let mut names: Vec<String> = links
        .iter()
        .map(|link| file_name(link))
        .filter(|name| {
            let lower = name.to_ascii_lowercase();
            lower.ends_with(".tif") || lower.ends_with(".tiff")
        })
        .map(str::to_string)
        .collect();

    names.sort();
    names.dedup();
    names
}

/// URL of the listing directory for `tile` below `base`.
pub fn tile_url(base: &str, tile: &TileCode) -> String {
    format!("{}/{}/", base.trim_end_matches('/'), tile)
}

/// Fetches the listing page for `tile` and returns its links.
pub async fn list_tile<F: Fetch + ?Sized>(
    fetcher: &F,
    base: &str,
    tile: &TileCode,
) -> Result<Vec<String>, ListingError> {
    let url = tile_url(base, tile);
    let html = fetcher
        .get_text(&url)
        .await
        .map_err(|source| ListingError::Fetch { url, source })?;

    Ok(extract_links(&html))
}

/// Dates with a daily archive for `tile`.
pub async fn list_tile_dates<F: Fetch + ?Sized>(
    fetcher: &F,
    base: &str,
    tile: &TileCode,
) -> Result<Vec<NaiveDate>, ListingError> {
    let links = list_tile(fetcher, base, tile).await?;
    daily_archive_dates(&links, tile)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::testing::MemoryFetcher;

    const LISTING: &str = r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 3.2 Final//EN">
<html>
 <head>
  <title>Index of /pub/flood_observatory/MODISlance/080e030n</title>
 </head>
 <body>
<h1>Index of /pub/flood_observatory/MODISlance/080e030n</h1>
<table>
<tr><th><a href="?C=N;O=D">Name</a></th><th><a href="?C=M;O=A">Last modified</a></th></tr>
<tr><td><A HREF="/pub/flood_observatory/MODISlance/">Parent Directory</A></td></tr>
<tr><td><a href="2019001_080e030n.zip">2019001_080e030n.zip</a></td></tr>
<tr><td><a href='2019003_080e030n.zip'>2019003_080e030n.zip</a></td></tr>
<tr><td><a class="f" href=2019002_080e030n.zip>2019002_080e030n.zip</a></td></tr>
<tr><td><abbr title="x">abbr</abbr><a href="readme.txt">readme.txt</a></td></tr>
</table>
</body></html>"#;

    fn tile() -> TileCode {
        "080e030n".parse().unwrap()
    }

    #[test]
    fn should_extract_all_anchor_links() {
        let links = extract_links(LISTING);

        assert_eq!(
            links,
            vec![
                "?C=N;O=D",
                "?C=M;O=A",
                "/pub/flood_observatory/MODISlance/",
                "2019001_080e030n.zip",
                "2019003_080e030n.zip",
                "2019002_080e030n.zip",
                "readme.txt",
            ]
        );
    }

    #[test]
    fn should_ignore_attributes_that_only_end_in_href() {
        let links = extract_links(r#"<a data-href="no" href="yes">x</a>"#);
        assert_eq!(links, vec!["yes"]);
    }

    #[test]
    fn should_parse_dates_by_pattern_not_position() {
        let links = extract_links(LISTING);
        let dates = daily_archive_dates(&links, &tile()).unwrap();

        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2019, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2019, 1, 3).unwrap(),
            ]
        );
    }

    #[test]
    fn should_ignore_archives_of_other_tiles() {
        let links = vec!["2019001_090e030n.zip".to_string()];
        assert!(daily_archive_dates(&links, &tile()).unwrap().is_empty());
    }

    #[test]
    fn should_fail_on_impossible_date() {
        let links = vec!["2019366_080e030n.zip".to_string()];
        let err = daily_archive_dates(&links, &tile()).unwrap_err();

        assert!(matches!(err, ListingError::MalformedDate { ref code, .. } if code == "2019366"));
    }

    #[test]
    fn should_take_file_name_of_links() {
        assert_eq!(file_name("a/b/c.tif"), "c.tif");
        assert_eq!(file_name("http://h/x/y.zip?x=1"), "y.zip");
        assert_eq!(file_name("/pub/dir/"), "dir");
    }

    #[test]
    fn should_select_geotiffs() {
        let links = vec![
            "../".to_string(),
            "MWP_2019015_080E030N_2D2OT.tif".to_string(),
            "MWP_2019015_080E030N_2D2OT.zip".to_string(),
        ];

        assert_eq!(geotiff_names(&links), vec!["MWP_2019015_080E030N_2D2OT.tif"]);
    }

    #[tokio::test]
    async fn should_list_dates_from_remote_listing() {
        let fetcher = MemoryFetcher::default().with("http://dfo/daily/080e030n/", LISTING);

        let dates = list_tile_dates(&fetcher, "http://dfo/daily/", &tile())
            .await
            .unwrap();

        assert_eq!(dates.len(), 3);
        assert_eq!(fetcher.requests(), vec!["http://dfo/daily/080e030n/"]);
    }

    #[tokio::test]
    async fn should_fail_on_unreachable_listing() {
        let fetcher = MemoryFetcher::default();

        let err = list_tile_dates(&fetcher, "http://dfo/daily", &tile())
            .await
            .unwrap_err();

        assert!(matches!(err, ListingError::Fetch { .. }));
    }
}
