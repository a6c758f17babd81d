use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{DeviceSplit, NewVisit, VisitSummary};
use crate::{Database, grouped_counts, top_countries};

impl Database {
    pub fn insert_visit(&self, visit: &NewVisit<'_>, created_at: DateTime<Utc>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO visits (session_id, ip, user_agent, geo, referrer, path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    visit.session_id,
                    visit.ip,
                    visit.user_agent,
                    visit.geo,
                    visit.referrer,
                    visit.path,
                    created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Set the duration of the session's most recent visit row.
    /// Returns false when the session has no visits.
    pub fn update_latest_visit_duration(&self, session_id: &str, duration_secs: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE visits SET duration = ?1 WHERE id = (
                     SELECT id FROM visits WHERE session_id = ?2
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1
                 )",
                rusqlite::params![duration_secs, session_id],
            )?;
            Ok(updated > 0)
        })
    }

    pub fn count_visits(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM visits", [], |r| r.get(0))?))
    }

    /// Distinct sessions with a visit created at or after `since`.
    pub fn live_sessions(&self, since: DateTime<Utc>) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(DISTINCT session_id) FROM visits WHERE created_at >= ?1",
                [since],
                |r| r.get(0),
            )?)
        })
    }

    /// Headline counters for the admin dashboard. Bounces are visits shorter
    /// than 5 seconds; the average ignores visits without a recorded duration.
    pub fn visit_summary(&self, day_ago: DateTime<Utc>) -> Result<VisitSummary> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*),
                        COUNT(DISTINCT ip),
                        COALESCE(SUM(created_at >= ?1), 0),
                        COALESCE(AVG(CASE WHEN duration > 0 THEN duration END), 0.0),
                        COALESCE(SUM(duration < 5), 0)
                 FROM visits",
                [day_ago],
                |r| {
                    Ok(VisitSummary {
                        total: r.get(0)?,
                        unique_ips: r.get(1)?,
                        since_day_ago: r.get(2)?,
                        avg_duration: r.get(3)?,
                        bounces: r.get(4)?,
                    })
                },
            )?)
        })
    }

    /// Visits per calendar day (UTC, `YYYY-MM-DD`) since `since`, oldest first.
    pub fn daily_visits(&self, since: DateTime<Utc>) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| {
            grouped_counts(
                conn,
                "SELECT date(created_at) AS day, COUNT(*) FROM visits
                 WHERE created_at >= ?1
                 GROUP BY day ORDER BY day ASC",
                rusqlite::params![since],
            )
        })
    }

    /// Visits per hour-of-day (`00`..`23`) since `since`, in hour order.
    pub fn hourly_visits(&self, since: DateTime<Utc>) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| {
            grouped_counts(
                conn,
                "SELECT strftime('%H', created_at) AS hour, COUNT(*) FROM visits
                 WHERE created_at >= ?1
                 GROUP BY hour ORDER BY hour ASC",
                rusqlite::params![since],
            )
        })
    }

    pub fn top_referrers(&self, limit: u32) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| {
            grouped_counts(
                conn,
                "SELECT referrer, COUNT(*) AS n FROM visits
                 WHERE referrer IS NOT NULL AND referrer != ''
                 GROUP BY referrer ORDER BY n DESC, referrer ASC
                 LIMIT ?1",
                rusqlite::params![limit],
            )
        })
    }

    pub fn top_paths(&self, limit: u32) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| {
            grouped_counts(
                conn,
                "SELECT path, COUNT(*) AS n FROM visits
                 GROUP BY path ORDER BY n DESC, path ASC
                 LIMIT ?1",
                rusqlite::params![limit],
            )
        })
    }

    /// Mobile versus desktop across visits with a recorded user agent.
    /// LIKE is ASCII case-insensitive, so markers match any casing.
    pub fn device_split(&self) -> Result<DeviceSplit> {
        self.with_conn(|conn| {
            let (total, mobile): (i64, i64) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(user_agent LIKE '%mobile%'
                                  OR user_agent LIKE '%android%'
                                  OR user_agent LIKE '%iphone%'
                                  OR user_agent LIKE '%ipad%'), 0)
                 FROM visits WHERE user_agent IS NOT NULL",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;
            Ok(DeviceSplit {
                mobile,
                desktop: total - mobile,
            })
        })
    }

    /// Browser share, most common first. The CASE arms are checked in order:
    /// Edge before Chrome (Edge UAs contain "chrome") and Chrome before
    /// Safari (Chrome UAs contain "safari").
    pub fn top_browsers(&self, limit: u32) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| {
            grouped_counts(
                conn,
                "SELECT CASE
                            WHEN user_agent LIKE '%firefox%' THEN 'Firefox'
                            WHEN user_agent LIKE '%edg%' THEN 'Edge'
                            WHEN user_agent LIKE '%chrome%'
                              OR user_agent LIKE '%chromium%'
                              OR user_agent LIKE '%crios%' THEN 'Chrome'
                            WHEN user_agent LIKE '%safari%' THEN 'Safari'
                            WHEN user_agent LIKE '%opera%' OR user_agent LIKE '%opr%' THEN 'Opera'
                            ELSE 'Other'
                        END AS browser,
                        COUNT(*) AS n
                 FROM visits WHERE user_agent IS NOT NULL
                 GROUP BY browser ORDER BY n DESC, browser ASC
                 LIMIT ?1",
                rusqlite::params![limit],
            )
        })
    }

    pub fn top_visit_countries(&self, limit: u32) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| top_countries(conn, "visits", limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
    const EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36 Edg/126.0.0.0";
    const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1";
    const CHROME_IOS: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/126.0 Mobile/15E148 Safari/604.1";
    const OPERA_PRESTO: &str = "Opera/9.80 (Windows NT 6.1; WOW64) Presto/2.12.388 Version/12.18";
    const OPERA_CHROMIUM: &str = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36 OPR/111.0";
    const ANDROID: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8)";
    const CURL: &str = "curl/8.5.0";

    fn visit<'a>(session_id: &'a str, path: &'a str, referrer: &'a str) -> NewVisit<'a> {
        NewVisit {
            session_id,
            ip: "192.0.2.1",
            user_agent: "Mozilla/5.0",
            geo: None,
            referrer,
            path,
        }
    }

    fn insert_agents(db: &Database, agents: &[&str]) {
        for ua in agents {
            let v = NewVisit {
                user_agent: *ua,
                ..visit("s", "/", "")
            };
            db.insert_visit(&v, Utc::now()).unwrap();
        }
    }

    fn insert_geos(db: &Database, geos: &[Option<&str>]) {
        for geo in geos {
            let v = NewVisit {
                geo: *geo,
                ..visit("s", "/", "")
            };
            db.insert_visit(&v, Utc::now()).unwrap();
        }
    }

    fn browser_of(ua: &str) -> String {
        let db = Database::open_in_memory().unwrap();
        insert_agents(&db, &[ua]);
        db.top_browsers(5).unwrap().remove(0).0
    }

    fn duration_of(db: &Database, id: i64) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row("SELECT duration FROM visits WHERE id = ?1", [id], |r| r.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn duration_targets_latest_row_of_session() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let older = db.insert_visit(&visit("s1", "/", ""), now - Duration::minutes(10)).unwrap();
        let latest = db.insert_visit(&visit("s1", "/projects", ""), now).unwrap();
        let other = db.insert_visit(&visit("s2", "/", ""), now).unwrap();

        assert!(db.update_latest_visit_duration("s1", 12).unwrap());
        assert!(db.update_latest_visit_duration("s1", 40).unwrap());

        assert_eq!(duration_of(&db, older), 0);
        assert_eq!(duration_of(&db, latest), 40);
        assert_eq!(duration_of(&db, other), 0);
        assert_eq!(db.count_visits().unwrap(), 3);

        assert!(!db.update_latest_visit_duration("nobody", 5).unwrap());
    }

    #[test]
    fn summary_counts_bounces_and_average() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.insert_visit(&visit("a", "/", ""), now).unwrap();
        db.insert_visit(&visit("b", "/", ""), now - Duration::days(2)).unwrap();
        db.update_latest_visit_duration("a", 30).unwrap();

        let summary = db.visit_summary(now - Duration::days(1)).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.unique_ips, 1);
        assert_eq!(summary.since_day_ago, 1);
        assert_eq!(summary.bounces, 1);
        assert!((summary.avg_duration - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_summary_is_zeroed() {
        let db = Database::open_in_memory().unwrap();
        let summary = db.visit_summary(Utc::now()).unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.bounces, 0);
        assert_eq!(summary.avg_duration, 0.0);
    }

    #[test]
    fn live_sessions_are_distinct_and_windowed() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.insert_visit(&visit("s1", "/", ""), now).unwrap();
        db.insert_visit(&visit("s1", "/a", ""), now).unwrap();
        db.insert_visit(&visit("s2", "/", ""), now - Duration::minutes(20)).unwrap();

        assert_eq!(db.live_sessions(now - Duration::minutes(5)).unwrap(), 1);
    }

    #[test]
    fn series_group_by_day_and_hour() {
        let db = Database::open_in_memory().unwrap();
        let t = Utc.with_ymd_and_hms(2026, 3, 10, 14, 30, 0).unwrap();
        db.insert_visit(&visit("a", "/", ""), t).unwrap();
        db.insert_visit(&visit("b", "/", ""), t + Duration::minutes(5)).unwrap();
        db.insert_visit(&visit("c", "/", ""), t - Duration::days(1)).unwrap();

        let daily = db.daily_visits(t - Duration::days(7)).unwrap();
        assert_eq!(
            daily,
            vec![("2026-03-09".to_string(), 1), ("2026-03-10".to_string(), 2)]
        );

        let hourly = db.hourly_visits(t - Duration::hours(1)).unwrap();
        assert_eq!(hourly, vec![("14".to_string(), 2)]);
    }

    #[test]
    fn top_lists_rank_by_count() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.insert_visit(&visit("a", "/", "https://news.ycombinator.com/"), now).unwrap();
        db.insert_visit(&visit("b", "/", "https://news.ycombinator.com/"), now).unwrap();
        db.insert_visit(&visit("c", "/blog", "https://t.co/x"), now).unwrap();
        db.insert_visit(&visit("d", "/blog", ""), now).unwrap();
        db.insert_visit(&visit("e", "/blog", ""), now).unwrap();

        let referrers = db.top_referrers(5).unwrap();
        assert_eq!(referrers[0], ("https://news.ycombinator.com/".to_string(), 2));
        assert_eq!(referrers.len(), 2);

        let paths = db.top_paths(1).unwrap();
        assert_eq!(paths, vec![("/blog".to_string(), 3)]);
    }

    #[test]
    fn browser_priority_order() {
        assert_eq!(browser_of(FIREFOX), "Firefox");
        assert_eq!(browser_of(EDGE), "Edge");
        assert_eq!(browser_of(CHROME), "Chrome");
        assert_eq!(browser_of(CHROME_IOS), "Chrome");
        assert_eq!(browser_of(SAFARI_IPHONE), "Safari");
        assert_eq!(browser_of(OPERA_PRESTO), "Opera");
        assert_eq!(browser_of(OPERA_CHROMIUM), "Chrome");
        assert_eq!(browser_of(CURL), "Other");
    }

    #[test]
    fn browser_counts_rank_and_limit() {
        let db = Database::open_in_memory().unwrap();
        insert_agents(&db, &[CHROME, FIREFOX, CHROME, EDGE, CHROME, FIREFOX, CURL]);

        let top = db.top_browsers(3).unwrap();
        assert_eq!(
            top,
            vec![
                ("Chrome".to_string(), 3),
                ("Firefox".to_string(), 2),
                ("Edge".to_string(), 1),
            ]
        );
        assert!(db.top_browsers(5).unwrap().iter().all(|(_, n)| *n > 0));
    }

    #[test]
    fn devices_split_on_mobile_markers() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.device_split().unwrap(), DeviceSplit::default());

        insert_agents(&db, &[SAFARI_IPHONE, ANDROID, CHROME, FIREFOX, CURL]);
        assert_eq!(db.device_split().unwrap(), DeviceSplit { mobile: 2, desktop: 3 });
    }

    #[test]
    fn countries_rank_and_skip_unreadable_geo() {
        let db = Database::open_in_memory().unwrap();
        insert_geos(
            &db,
            &[
                Some(r#"{"country":"Poland"}"#),
                Some("garbage"),
                Some(r#"{"country":"Germany"}"#),
                None,
                Some(r#"{"country":"Germany"}"#),
                Some("{}"),
                Some(""),
                Some("[1,2]"),
                Some(r#"{"country":"  "}"#),
                Some(r#"{"country":42}"#),
                Some(r#"{"country":"Poland"}"#),
                Some(r#"{"country":"Poland"}"#),
                Some(r#"{"country":"Chile","city":"Santiago"}"#),
            ],
        );

        assert_eq!(
            db.top_visit_countries(5).unwrap(),
            vec![
                ("Poland".to_string(), 3),
                ("Germany".to_string(), 2),
                ("Chile".to_string(), 1),
            ]
        );
    }

    #[test]
    fn country_ties_keep_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let blobs = ["F", "B", "E", "A", "D", "C"].map(|c| format!(r#"{{"country":"{c}"}}"#));
        let geos: Vec<Option<&str>> = blobs.iter().map(|b| Some(b.as_str())).collect();
        insert_geos(&db, &geos);

        let names: Vec<String> = db.top_visit_countries(5).unwrap().into_iter().map(|(c, _)| c).collect();
        assert_eq!(names, vec!["F", "B", "E", "A", "D"]);
    }
}
