//! Record loader: writes one decoded tweet into the normalized schema.
//!
//! Every function takes the connection explicitly. A record is written in a
//! single transaction: either the tweet and all of its users, urls, mentions,
//! tags and media land together, or nothing does.

use crate::error::Result;
use crate::model::{Geometry, LoadOutcome, UserRow};
use crate::record::{self, TweetRecord};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, trace};

/// Whether a tweet id is already stored.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn tweet_exists(conn: &Connection, id_tweets: i64) -> Result<bool> {
    let found = conn
        .prepare_cached("SELECT 1 FROM tweets WHERE id_tweets = ?1")?
        .query_row(params![id_tweets], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Return the id of `url` in the `urls` table, inserting it if unseen.
///
/// The insert runs first; when it conflicts with an existing row nothing is
/// returned and the id is read back with a plain lookup.
///
/// # Errors
///
/// Returns an error if either statement fails.
pub fn get_id_urls(conn: &Connection, url: &str) -> Result<i64> {
    let inserted: Option<i64> = conn
        .prepare_cached(
            "INSERT INTO urls (url) VALUES (?1) ON CONFLICT (url) DO NOTHING RETURNING id_urls",
        )?
        .query_row(params![url], |row| row.get(0))
        .optional()?;

    if let Some(id_urls) = inserted {
        trace!(id_urls, url, "Interned new url");
        return Ok(id_urls);
    }

    let id_urls = conn
        .prepare_cached("SELECT id_urls FROM urls WHERE url = ?1")?
        .query_row(params![url], |row| row.get(0))?;
    Ok(id_urls)
}

/// Insert a user known only by id (and possibly handle/name).
///
/// Existing rows are never touched, hydrated or not.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_unhydrated_user(
    conn: &Connection,
    id_users: i64,
    screen_name: Option<&str>,
    name: Option<&str>,
) -> Result<bool> {
    let changed = conn
        .prepare_cached(
            "INSERT INTO users (id_users, screen_name, name) VALUES (?1, ?2, ?3)
             ON CONFLICT (id_users) DO NOTHING",
        )?
        .execute(params![id_users, screen_name, name])?;
    Ok(changed > 0)
}

fn insert_user(conn: &Connection, user: &UserRow) -> Result<bool> {
    let id_urls = user
        .url
        .as_deref()
        .map(|url| get_id_urls(conn, url))
        .transpose()?;

    let changed = conn
        .prepare_cached(
            r"
            INSERT INTO users
            (id_users, created_at, updated_at, screen_name, name, location, id_urls,
             description, protected, verified, friends_count, listed_count,
             favourites_count, statuses_count, withheld_in_countries)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT (id_users) DO NOTHING
            ",
        )?
        .execute(params![
            user.id_users,
            user.created_at,
            user.updated_at,
            user.screen_name,
            user.name,
            user.location,
            id_urls,
            user.description,
            user.protected,
            user.verified,
            user.friends_count,
            user.listed_count,
            user.favourites_count,
            user.statuses_count,
            user.withheld_in_countries,
        ])?;
    Ok(changed > 0)
}

/// Write every row of an extracted record.
///
/// Expects to run inside a transaction owned by the caller. Returns
/// [`LoadOutcome::Skipped`] without writing associated rows if the tweet row
/// already exists.
///
/// # Errors
///
/// Returns the first failing statement's error; the caller must roll back.
pub fn write_record(conn: &Connection, record: &TweetRecord) -> Result<LoadOutcome> {
    let tweet = &record.tweet;

    if !insert_user(conn, &record.user)? {
        trace!(id_users = record.user.id_users, "Author already present");
    }

    if let Some(reply_to) = tweet.in_reply_to_user_id {
        if insert_unhydrated_user(conn, reply_to, None, None)? {
            debug!(id_users = reply_to, "Inserted unhydrated reply target");
        }
    }

    let inserted = conn
        .prepare_cached(
            r"
            INSERT INTO tweets
            (id_tweets, id_users, created_at, in_reply_to_status_id, in_reply_to_user_id,
             quoted_status_id, geo, retweet_count, quote_count, favorite_count,
             withheld_copyright, withheld_in_countries, place_name, country_code,
             state_code, lang, text, source)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT (id_tweets) DO NOTHING
            ",
        )?
        .execute(params![
            tweet.id_tweets,
            tweet.id_users,
            tweet.created_at,
            tweet.in_reply_to_status_id,
            tweet.in_reply_to_user_id,
            tweet.quoted_status_id,
            tweet.geo.as_ref().map(Geometry::to_wkt),
            tweet.retweet_count,
            tweet.quote_count,
            tweet.favorite_count,
            tweet.withheld_copyright,
            tweet.withheld_in_countries,
            tweet.place_name,
            tweet.country_code,
            tweet.state_code,
            tweet.lang,
            tweet.text,
            tweet.source,
        ])?;

    if inserted == 0 {
        debug!(id_tweets = tweet.id_tweets, "Tweet inserted concurrently, skipping");
        return Ok(LoadOutcome::Skipped);
    }

    for url in &record.urls {
        let id_urls = get_id_urls(conn, url)?;
        conn.prepare_cached(
            "INSERT INTO tweet_urls (id_tweets, id_urls) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
        )?
        .execute(params![tweet.id_tweets, id_urls])?;
    }

    for mention in &record.mentions {
        insert_unhydrated_user(
            conn,
            mention.id_users,
            mention.screen_name.as_deref(),
            mention.name.as_deref(),
        )?;
        conn.prepare_cached(
            "INSERT INTO tweet_mentions (id_tweets, id_users) VALUES (?1, ?2)
             ON CONFLICT DO NOTHING",
        )?
        .execute(params![tweet.id_tweets, mention.id_users])?;
    }

    for tag in &record.tags {
        conn.prepare_cached(
            "INSERT INTO tweet_tags (id_tweets, tag) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
        )?
        .execute(params![tweet.id_tweets, tag])?;
    }

    for medium in &record.media {
        let id_urls = get_id_urls(conn, &medium.media_url)?;
        conn.prepare_cached(
            "INSERT INTO tweet_media (id_tweets, id_urls, type) VALUES (?1, ?2, ?3)
             ON CONFLICT DO NOTHING",
        )?
        .execute(params![tweet.id_tweets, id_urls, medium.media_type])?;
    }

    Ok(LoadOutcome::Inserted)
}

/// Ensure the store reflects `record` exactly once.
///
/// Already-stored tweet ids return [`LoadOutcome::Skipped`] before anything
/// else is read from the record. Otherwise the record is extracted and
/// written in one transaction that is rolled back on any error.
///
/// # Errors
///
/// Returns an error if the record is malformed or any statement fails; in
/// both cases nothing from this record is left in the store.
pub fn insert_tweet(conn: &mut Connection, record: &Value) -> Result<LoadOutcome> {
    let id_tweets = record::tweet_id(record)?;
    if tweet_exists(conn, id_tweets)? {
        trace!(id_tweets, "Tweet already loaded");
        return Ok(LoadOutcome::Skipped);
    }

    let extracted = TweetRecord::from_value(record)?;

    let tx = conn.transaction()?;
    let outcome = write_record(&tx, &extracted)?;
    tx.commit()?;
    Ok(outcome)
}
