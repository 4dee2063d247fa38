//! Extraction of normalized rows from one decoded tweet record.
//!
//! Records arrive in several shapes: long tweets carry their text and
//! entities under `extended_tweet`, media may live under either
//! `extended_tweet.extended_entities` or `extended_entities`, and location may
//! be a point, a place bounding box, or absent. Each alternative is expressed
//! as an ordered candidate list resolved by [`first_present`].
//!
//! Nothing here touches the store; see [`crate::loader`] for the writes.

use crate::error::{LoaderError, Result};
use crate::model::{Geometry, MediaRow, MentionRow, TweetRow, UserRow};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::borrow::Cow;

/// A key path into a record, e.g. `&["extended_tweet", "full_text"]`.
pub type FieldPath = &'static [&'static str];

/// Tweet id, numeric form preferred over the string form.
pub const TWEET_ID: &[FieldPath] = &[&["id"], &["id_str"]];
/// Author id.
pub const USER_ID: &[FieldPath] = &[&["user", "id"], &["user", "id_str"]];
/// Display text: full text of extended tweets, else the base text.
pub const TEXT: &[FieldPath] = &[&["extended_tweet", "full_text"], &["text"]];
/// URL entities.
pub const URLS: &[FieldPath] = &[
    &["extended_tweet", "entities", "urls"],
    &["entities", "urls"],
];
/// Mention entities.
pub const MENTIONS: &[FieldPath] = &[
    &["extended_tweet", "entities", "user_mentions"],
    &["entities", "user_mentions"],
];
/// Entity objects holding hashtags and cashtags. Both lists are read from
/// the first object that carries both keys.
pub const TAG_SOURCES: &[FieldPath] = &[&["extended_tweet", "entities"], &["entities"]];
/// Media entities. Absent everywhere means no media.
pub const MEDIA: &[FieldPath] = &[
    &["extended_tweet", "extended_entities", "media"],
    &["extended_entities", "media"],
];

const POINT_COORDINATES: FieldPath = &["geo", "coordinates"];
const PLACE_BOUNDING_BOX: FieldPath = &["place", "bounding_box", "coordinates"];

/// Native timestamp format of the records: `Wed Oct 10 20:19:24 +0000 2018`.
const RECORD_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Strip the null character, which the store cannot represent.
///
/// Idempotent; borrows the input when there is nothing to strip.
#[must_use]
pub fn remove_nulls(s: &str) -> Cow<'_, str> {
    if memchr::memchr(0, s.as_bytes()).is_none() {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.replace('\0', ""))
    }
}

/// Resolve a key path. Missing keys and JSON `null` both count as absent.
#[must_use]
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .filter(|found| !found.is_null())
}

/// Return the first candidate path that is present in `value`.
#[must_use]
pub fn first_present<'a>(value: &'a Value, candidates: &[FieldPath]) -> Option<&'a Value> {
    candidates.iter().find_map(|path| lookup(value, path))
}

fn field_name(path: &[&str]) -> String {
    path.join(".")
}

fn candidates_name(candidates: &[FieldPath]) -> String {
    candidates
        .first()
        .map(|path| field_name(path))
        .unwrap_or_default()
}

fn as_id(value: &Value, field: &str) -> Result<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| LoaderError::invalid_field(field, format!("{n} is not a 64-bit id"))),
        Value::String(s) => s
            .parse()
            .map_err(|_| LoaderError::invalid_field(field, format!("'{s}' is not a numeric id"))),
        other => Err(LoaderError::invalid_field(
            field,
            format!("expected an id, found {other}"),
        )),
    }
}

fn required_id(record: &Value, candidates: &[FieldPath]) -> Result<i64> {
    let name = candidates_name(candidates);
    let value = first_present(record, candidates).ok_or_else(|| LoaderError::missing_field(&name))?;
    as_id(value, &name)
}

fn optional_id(record: &Value, path: FieldPath) -> Result<Option<i64>> {
    lookup(record, path)
        .map(|value| as_id(value, &field_name(path)))
        .transpose()
}

fn optional_str<'a>(record: &'a Value, path: FieldPath) -> Result<Option<&'a str>> {
    match lookup(record, path) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(LoaderError::invalid_field(
            field_name(path),
            format!("expected a string, found {other}"),
        )),
    }
}

fn optional_text(record: &Value, path: FieldPath) -> Result<Option<String>> {
    Ok(optional_str(record, path)?.map(|s| remove_nulls(s).into_owned()))
}

fn optional_i64(record: &Value, path: FieldPath) -> Result<Option<i64>> {
    match lookup(record, path) {
        None => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| {
            LoaderError::invalid_field(field_name(path), format!("expected an integer, found {value}"))
        }),
    }
}

fn optional_bool(record: &Value, path: FieldPath) -> Result<Option<bool>> {
    match lookup(record, path) {
        None => Ok(None),
        Some(value) => value.as_bool().map(Some).ok_or_else(|| {
            LoaderError::invalid_field(field_name(path), format!("expected a boolean, found {value}"))
        }),
    }
}

fn optional_json(record: &Value, path: FieldPath) -> Option<String> {
    lookup(record, path).map(Value::to_string)
}

/// Parse a record timestamp into RFC 3339 UTC.
///
/// Accepts the native record format and ISO 8601.
///
/// # Errors
///
/// Returns [`LoaderError::InvalidDate`] when neither format matches.
pub fn parse_timestamp(value: &str, field: &str) -> Result<String> {
    DateTime::parse_from_str(value, RECORD_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339())
        .map_err(|_| LoaderError::InvalidDate {
            value: value.to_string(),
            field: field.to_string(),
        })
}

fn optional_timestamp(record: &Value, path: FieldPath) -> Result<Option<String>> {
    optional_str(record, path)?
        .map(|s| parse_timestamp(s, &field_name(path)))
        .transpose()
}

fn coordinate(value: &Value, field: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| LoaderError::invalid_field(field, format!("expected a number, found {value}")))
}

fn coordinate_pair(value: &Value, field: &str) -> Result<(f64, f64)> {
    match value.as_array().map(Vec::as_slice) {
        Some([x, y, ..]) => Ok((coordinate(x, field)?, coordinate(y, field)?)),
        _ => Err(LoaderError::invalid_field(
            field,
            format!("expected a coordinate pair, found {value}"),
        )),
    }
}

/// Derive the tweet location.
///
/// Precedence: `geo.coordinates` as a point, then the place bounding box as a
/// multipolygon, then no geometry. A record that claims geo support but
/// carries neither source also yields `None`.
///
/// # Errors
///
/// Returns [`LoaderError::InvalidField`] when a present source is malformed.
pub fn geometry(record: &Value) -> Result<Option<Geometry>> {
    if let Some(coords) = lookup(record, POINT_COORDINATES) {
        let (lon, lat) = coordinate_pair(coords, &field_name(POINT_COORDINATES))?;
        return Ok(Some(Geometry::Point { lon, lat }));
    }

    let Some(polygons) = lookup(record, PLACE_BOUNDING_BOX) else {
        return Ok(None);
    };
    let field = field_name(PLACE_BOUNDING_BOX);
    let polygons = polygons
        .as_array()
        .ok_or_else(|| LoaderError::invalid_field(&field, "expected a list of rings"))?;

    let mut rings = Vec::with_capacity(polygons.len());
    for ring in polygons {
        let points = ring
            .as_array()
            .filter(|points| !points.is_empty())
            .ok_or_else(|| LoaderError::invalid_field(&field, "expected a non-empty ring"))?;
        let ring = points
            .iter()
            .map(|point| coordinate_pair(point, &field))
            .collect::<Result<Vec<_>>>()?;
        rings.push(ring);
    }

    if rings.is_empty() {
        return Ok(None);
    }
    Ok(Some(Geometry::MultiPolygon { rings }))
}

/// Display text: extended full text, else the base text.
///
/// # Errors
///
/// Returns an error if neither text field is present or a string.
pub fn display_text(record: &Value) -> Result<String> {
    let value = first_present(record, TEXT).ok_or_else(|| LoaderError::missing_field("text"))?;
    value
        .as_str()
        .map(|s| remove_nulls(s).into_owned())
        .ok_or_else(|| LoaderError::invalid_field("text", "expected a string"))
}

/// Place-derived columns of a tweet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceCodes {
    pub place_name: Option<String>,
    pub country_code: Option<String>,
    pub state_code: Option<String>,
}

/// Derive place name, lower-cased country code and, for `us` only, the
/// state code: the last comma segment of the full name, dropped when longer
/// than two characters.
///
/// # Errors
///
/// Returns an error if a place field is present but not a string.
pub fn place_codes(record: &Value) -> Result<PlaceCodes> {
    let place_name = optional_text(record, &["place", "full_name"])?;
    let country_code = optional_str(record, &["place", "country_code"])?.map(str::to_lowercase);

    let state_code = match (country_code.as_deref(), place_name.as_deref()) {
        (Some("us"), Some(full_name)) => state_code(full_name),
        _ => None,
    };

    Ok(PlaceCodes {
        place_name,
        country_code,
        state_code,
    })
}

fn state_code(full_name: &str) -> Option<String> {
    let segment = full_name.rsplit(',').next()?.trim().to_lowercase();
    (segment.chars().count() <= 2).then_some(segment)
}

fn entity_list<'a>(record: &'a Value, candidates: &[FieldPath]) -> Result<&'a [Value]> {
    let name = candidates_name(candidates);
    first_present(record, candidates)
        .ok_or_else(|| LoaderError::missing_field(&name))?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| LoaderError::invalid_field(name, "expected a list"))
}

fn entity_urls(record: &Value) -> Result<Vec<String>> {
    entity_list(record, URLS)?
        .iter()
        .map(|entity| -> Result<String> {
            optional_str(entity, &["expanded_url"])?
                .or(optional_str(entity, &["url"])?)
                .map(String::from)
                .ok_or_else(|| LoaderError::missing_field("entities.urls[].expanded_url"))
        })
        .collect()
}

fn entity_mentions(record: &Value) -> Result<Vec<MentionRow>> {
    entity_list(record, MENTIONS)?
        .iter()
        .map(|entity| -> Result<MentionRow> {
            Ok(MentionRow {
                id_users: required_id(entity, &[&["id"], &["id_str"]])?,
                screen_name: optional_text(entity, &["screen_name"])?,
                name: optional_text(entity, &["name"])?,
            })
        })
        .collect()
}

fn tag_source(record: &Value) -> Result<(&Value, String)> {
    TAG_SOURCES
        .iter()
        .filter_map(|path| lookup(record, path).map(|entities| (entities, field_name(path))))
        .find(|(entities, _)| {
            lookup(entities, &["hashtags"]).is_some() && lookup(entities, &["symbols"]).is_some()
        })
        .ok_or_else(|| LoaderError::missing_field("entities.hashtags"))
}

fn entity_tags(record: &Value) -> Result<Vec<String>> {
    let (entities, source) = tag_source(record)?;
    let mut tags = Vec::new();
    for (key, prefix) in [("hashtags", '#'), ("symbols", '$')] {
        let name = format!("{source}.{key}");
        let list = lookup(entities, &[key])
            .and_then(Value::as_array)
            .ok_or_else(|| LoaderError::invalid_field(&name, "expected a list"))?;
        for entity in list {
            let text = optional_str(entity, &["text"])?
                .ok_or_else(|| LoaderError::missing_field(format!("{name}[].text")))?;
            tags.push(remove_nulls(&format!("{prefix}{text}")).into_owned());
        }
    }
    Ok(tags)
}

fn entity_media(record: &Value) -> Result<Vec<MediaRow>> {
    let Some(media) = first_present(record, MEDIA) else {
        return Ok(Vec::new());
    };
    let media = media
        .as_array()
        .ok_or_else(|| LoaderError::invalid_field(candidates_name(MEDIA), "expected a list"))?;

    media
        .iter()
        .map(|entity| -> Result<MediaRow> {
            Ok(MediaRow {
                media_url: optional_str(entity, &["media_url"])?
                    .ok_or_else(|| LoaderError::missing_field("media[].media_url"))?
                    .to_string(),
                media_type: optional_str(entity, &["type"])?
                    .ok_or_else(|| LoaderError::missing_field("media[].type"))?
                    .to_string(),
            })
        })
        .collect()
}

/// Read only the tweet id, for the duplicate check.
///
/// # Errors
///
/// Returns an error if the record has no usable id.
pub fn tweet_id(record: &Value) -> Result<i64> {
    required_id(record, TWEET_ID)
}

/// Every row one record contributes to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TweetRecord {
    pub user: UserRow,
    pub tweet: TweetRow,
    /// Expanded URLs, in entity order.
    pub urls: Vec<String>,
    pub mentions: Vec<MentionRow>,
    /// `#hashtag` entries followed by `$cashtag` entries.
    pub tags: Vec<String>,
    pub media: Vec<MediaRow>,
}

impl TweetRecord {
    /// Extract all rows from a decoded record.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::MissingField`], [`LoaderError::InvalidField`] or
    /// [`LoaderError::InvalidDate`] when the record does not have the expected
    /// shape.
    pub fn from_value(record: &Value) -> Result<Self> {
        if !record.is_object() {
            return Err(LoaderError::invalid_field("record", "expected a JSON object"));
        }

        let id_tweets = tweet_id(record)?;
        let id_users = required_id(record, USER_ID)?;
        let created_at = optional_timestamp(record, &["created_at"])?
            .ok_or_else(|| LoaderError::missing_field("created_at"))?;

        let user = UserRow {
            id_users,
            created_at: optional_timestamp(record, &["user", "created_at"])?,
            updated_at: Some(created_at.clone()),
            screen_name: optional_text(record, &["user", "screen_name"])?,
            name: optional_text(record, &["user", "name"])?,
            location: optional_text(record, &["user", "location"])?,
            url: optional_str(record, &["user", "url"])?.map(String::from),
            description: optional_text(record, &["user", "description"])?,
            protected: optional_bool(record, &["user", "protected"])?,
            verified: optional_bool(record, &["user", "verified"])?,
            friends_count: optional_i64(record, &["user", "friends_count"])?,
            listed_count: optional_i64(record, &["user", "listed_count"])?,
            favourites_count: optional_i64(record, &["user", "favourites_count"])?,
            statuses_count: optional_i64(record, &["user", "statuses_count"])?,
            withheld_in_countries: optional_json(record, &["user", "withheld_in_countries"]),
        };

        let place = place_codes(record)?;
        let tweet = TweetRow {
            id_tweets,
            id_users,
            created_at,
            in_reply_to_status_id: optional_id(record, &["in_reply_to_status_id"])?,
            in_reply_to_user_id: optional_id(record, &["in_reply_to_user_id"])?,
            quoted_status_id: optional_id(record, &["quoted_status_id"])?,
            geo: geometry(record)?,
            retweet_count: optional_i64(record, &["retweet_count"])?,
            quote_count: optional_i64(record, &["quote_count"])?,
            favorite_count: optional_i64(record, &["favorite_count"])?,
            withheld_copyright: optional_bool(record, &["withheld_copyright"])?,
            withheld_in_countries: optional_json(record, &["withheld_in_countries"]),
            place_name: place.place_name,
            country_code: place.country_code,
            state_code: place.state_code,
            lang: optional_str(record, &["lang"])?.map(String::from),
            text: display_text(record)?,
            source: optional_text(record, &["source"])?,
        };

        Ok(Self {
            user,
            tweet,
            urls: entity_urls(record)?,
            mentions: entity_mentions(record)?,
            tags: entity_tags(record)?,
            media: entity_media(record)?,
        })
    }
}
