//! Row models for the normalized tweet schema.
//!
//! These structures represent one decoded record after extraction, in the
//! shape the loader writes them to the store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An author or referenced account.
///
/// Only `id_users` is guaranteed; everything else is hydration data that may
/// be unknown when the user is first seen through a mention or reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    pub id_users: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub screen_name: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    /// Profile URL, interned into `urls` at write time.
    pub url: Option<String>,
    pub description: Option<String>,
    pub protected: Option<bool>,
    pub verified: Option<bool>,
    pub friends_count: Option<i64>,
    pub listed_count: Option<i64>,
    pub favourites_count: Option<i64>,
    pub statuses_count: Option<i64>,
    /// JSON array text, e.g. `["DE","FR"]`.
    pub withheld_in_countries: Option<String>,
}

/// A tweet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweetRow {
    pub id_tweets: i64,
    pub id_users: i64,
    pub created_at: String,
    pub in_reply_to_status_id: Option<i64>,
    pub in_reply_to_user_id: Option<i64>,
    pub quoted_status_id: Option<i64>,
    pub geo: Option<Geometry>,
    pub retweet_count: Option<i64>,
    pub quote_count: Option<i64>,
    pub favorite_count: Option<i64>,
    pub withheld_copyright: Option<bool>,
    pub withheld_in_countries: Option<String>,
    pub place_name: Option<String>,
    pub country_code: Option<String>,
    pub state_code: Option<String>,
    pub lang: Option<String>,
    pub text: String,
    pub source: Option<String>,
}

/// A mentioned account, stored as an unhydrated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionRow {
    pub id_users: i64,
    pub screen_name: Option<String>,
    pub name: Option<String>,
}

/// Media attached to a tweet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRow {
    pub media_url: String,
    pub media_type: String,
}

/// Tweet location, rendered as well-known text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// A single coordinate pair, kept in source order.
    Point { lon: f64, lat: f64 },
    /// Rings of a single polygon (outer boundary first), each left open;
    /// the closing point is added on render.
    MultiPolygon { rings: Vec<Vec<(f64, f64)>> },
}

impl Geometry {
    /// Render as WKT: `POINT(x y)` or `MULTIPOLYGON(((x y,...,x0 y0),...))`.
    #[must_use]
    pub fn to_wkt(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point { lon, lat } => write!(f, "POINT({lon} {lat})"),
            Self::MultiPolygon { rings } => {
                f.write_str("MULTIPOLYGON((")?;
                for (i, ring) in rings.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str("(")?;
                    for (x, y) in ring {
                        write!(f, "{x} {y},")?;
                    }
                    // every ring is closed by repeating its first point
                    if let Some((x, y)) = ring.first() {
                        write!(f, "{x} {y}")?;
                    }
                    f.write_str(")")?;
                }
                f.write_str("))")
            }
        }
    }
}

/// Result of loading a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    /// The tweet and all of its associated rows were written.
    Inserted,
    /// The tweet id was already present; nothing was written.
    Skipped,
}

/// Totals for one run of the loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub archives: usize,
    pub entries: usize,
    pub records: usize,
    pub inserted: usize,
    pub skipped: usize,
}

impl LoadSummary {
    /// Fold a single record outcome into the totals.
    pub fn record(&mut self, outcome: LoadOutcome) {
        self.records += 1;
        match outcome {
            LoadOutcome::Inserted => self.inserted += 1,
            LoadOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Row counts for every table in the schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub users: i64,
    pub tweets: i64,
    pub urls: i64,
    pub tweet_urls: i64,
    pub tweet_mentions: i64,
    pub tweet_tags: i64,
    pub tweet_media: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_renders_in_source_order() {
        let geo = Geometry::Point {
            lon: 10.0,
            lat: 20.5,
        };
        assert_eq!(geo.to_wkt(), "POINT(10 20.5)");
    }

    #[test]
    fn multipolygon_closes_every_ring() {
        let geo = Geometry::MultiPolygon {
            rings: vec![
                vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)],
                vec![(-97.5, 30.25), (-97.0, 30.25)],
            ],
        };
        assert_eq!(
            geo.to_wkt(),
            "MULTIPOLYGON(((0 0,1 0,1 1,0 0),(-97.5 30.25,-97 30.25,-97.5 30.25)))"
        );
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = LoadSummary::default();
        summary.record(LoadOutcome::Inserted);
        summary.record(LoadOutcome::Skipped);
        summary.record(LoadOutcome::Inserted);
        assert_eq!(summary.records, 3);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.skipped, 1);
    }
}
