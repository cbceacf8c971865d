// src/store/questions.rs
//
// The six fixed read-only aggregates run against the loaded tables.
// Each returns its value so callers (and tests) can assert on it; the
// driver logs the answers.

use anyhow::Result;
use chrono::NaiveDate;
use duckdb::{params, Connection};

/// How many distinct users changed a property.
pub fn distinct_user_count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(DISTINCT user_id) FROM users", [], |r| {
        r.get(0)
    })?;
    Ok(count)
}

/// Every ad provider seen in the marketing events.
pub fn distinct_providers(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT provider FROM marketing ORDER BY provider")?;
    let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
    let mut providers = Vec::new();
    for row in rows {
        providers.push(row?);
    }
    Ok(providers)
}

/// The property users change most often, if any rows are loaded.
pub fn most_changed_property(conn: &Connection) -> Result<Option<String>> {
    let mut stmt = conn.prepare(
        "SELECT property, COUNT(1) AS counts
         FROM users
         GROUP BY 1
         ORDER BY 2 DESC",
    )?;
    let mut rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// How many impressions a provider served on a given calendar date.
pub fn impressions_on(conn: &Connection, provider: &str, date: NaiveDate) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(1)
         FROM marketing
         WHERE provider = ?
         AND CAST(event_ts AS DATE) = CAST(? AS DATE)",
        params![provider, date.format("%Y-%m-%d").to_string()],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// The ad shown most often to users matching a property/value pair
/// (case-insensitive), joined through the shared phone id.
pub fn top_ad_for_audience(
    conn: &Connection,
    property: &str,
    value: &str,
) -> Result<Option<String>> {
    let mut stmt = conn.prepare(
        "SELECT a.ad_id, COUNT(1) AS counts
         FROM marketing AS a
         JOIN users AS b
         ON a.phone_id = b.phone_id
         WHERE UPPER(b.property) = UPPER(?)
         AND UPPER(b.value) = UPPER(?)
         GROUP BY 1
         ORDER BY 2 DESC",
    )?;
    let mut rows = stmt.query_map(params![property, value], |r| r.get::<_, String>(0))?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// The `limit` ads with the widest reach, measured as distinct phones
/// that both saw the ad and appear in the users table.
pub fn top_ads_by_reach(conn: &Connection, limit: usize) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT a.ad_id, COUNT(DISTINCT a.phone_id) AS counts
         FROM marketing AS a
         JOIN users AS b
         ON a.phone_id = b.phone_id
         GROUP BY 1
         ORDER BY 2 DESC
         LIMIT ?",
    )?;
    let rows = stmt.query_map(params![limit as i64], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
    })?;
    let mut ads = Vec::new();
    for row in rows {
        ads.push(row?);
    }
    Ok(ads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{create_tables, open_mem_db};
    use anyhow::Result;

    fn fixture_db() -> Result<Connection> {
        let conn = open_mem_db()?;
        create_tables(&conn)?;
        conn.execute_batch(
            "INSERT INTO users VALUES
                ('e1','u1','p1','politics','moderate','2019-07-01 08:00:00'),
                ('e2','u1','p1','politics','left','2019-07-02 08:00:00'),
                ('e3','u2','p2','sports','tennis','2019-07-02 09:00:00'),
                ('e4','u3','p3','politics','moderate','2019-07-03 10:00:00');
             INSERT INTO marketing VALUES
                ('m1','p1','ad1','Snapchat','feed','15','2019-07-03 09:00:00'),
                ('m2','p1','ad1','Snapchat','story','30','2019-07-03 18:30:00'),
                ('m3','p2','ad2','Facebook','feed','15','2019-07-03 12:00:00'),
                ('m4','p3','ad1','Snapchat','feed','15','2019-07-04 12:00:00'),
                ('m5','p3','ad2','Twitter','feed','30','2019-07-04 13:00:00'),
                ('m6','p2','ad1','Snapchat','story','30','2019-07-05 09:00:00');",
        )?;
        Ok(conn)
    }

    #[test]
    fn counts_distinct_users() -> Result<()> {
        let conn = fixture_db()?;
        assert_eq!(distinct_user_count(&conn)?, 3);
        Ok(())
    }

    #[test]
    fn lists_distinct_providers() -> Result<()> {
        let conn = fixture_db()?;
        assert_eq!(
            distinct_providers(&conn)?,
            vec!["Facebook", "Snapchat", "Twitter"]
        );
        Ok(())
    }

    #[test]
    fn finds_most_changed_property() -> Result<()> {
        let conn = fixture_db()?;
        assert_eq!(most_changed_property(&conn)?.as_deref(), Some("politics"));
        Ok(())
    }

    #[test]
    fn most_changed_property_is_none_on_empty_table() -> Result<()> {
        let conn = open_mem_db()?;
        create_tables(&conn)?;
        assert_eq!(most_changed_property(&conn)?, None);
        Ok(())
    }

    #[test]
    fn counts_provider_impressions_on_a_date() -> Result<()> {
        let conn = fixture_db()?;
        let date = NaiveDate::from_ymd_opt(2019, 7, 3).unwrap();
        assert_eq!(impressions_on(&conn, "Snapchat", date)?, 2);
        assert_eq!(impressions_on(&conn, "Twitter", date)?, 0);
        Ok(())
    }

    #[test]
    fn ranks_ads_for_an_audience_case_insensitively() -> Result<()> {
        let conn = fixture_db()?;
        // p1 and p3 are moderates; ad1 hits them 3 times, ad2 once
        assert_eq!(
            top_ad_for_audience(&conn, "POLITICS", "MODERATE")?.as_deref(),
            Some("ad1")
        );
        Ok(())
    }

    #[test]
    fn ranks_ads_by_distinct_phone_reach() -> Result<()> {
        let conn = fixture_db()?;
        let top = top_ads_by_reach(&conn, 5)?;
        assert_eq!(top[0], ("ad1".to_string(), 3));
        assert_eq!(top[1], ("ad2".to_string(), 2));
        Ok(())
    }
}
