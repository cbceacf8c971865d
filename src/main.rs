use adlog::{config::Config, discover, preprocess, store};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let config_path = std::env::var("ADLOG_CONFIG").unwrap_or_else(|_| "adlog.yaml".to_string());
    let config = if Path::new(&config_path).is_file() {
        Config::load(Path::new(&config_path))?
    } else {
        info!(path = %config_path, "no config file, using defaults");
        Config::default()
    };

    // ─── 3) discover input files ─────────────────────────────────────
    let files = discover::csv_files(&config.dataset_dir)?;
    if files.is_empty() {
        info!(dir = %config.dataset_dir.display(), "no csv files; exit");
        return Ok(());
    }
    info!("{} files to preprocess", files.len());

    // ─── 4) repair every file, isolating failures per file ───────────
    let outcomes = preprocess::preprocess_all(&files);

    let mut loadable = Vec::new();
    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => {
                info!(
                    file = %outcome.path.display(),
                    malformed = report.malformed,
                    merged = report.merged,
                    quarantined = report.quarantined,
                    empty_dropped = report.empty_dropped,
                    "preprocessed"
                );
                loadable.push(&outcome.path);
            }
            Err(e) => {
                failed += 1;
                error!(file = %outcome.path.display(), "preprocess failed: {e:#}");
            }
        }
    }
    info!(
        ok = loadable.len(),
        failed,
        total = outcomes.len(),
        "preprocessing done"
    );

    // ─── 5) bulk load repaired files ─────────────────────────────────
    let conn = store::open_db(&config.db_path)?;
    store::create_tables(&conn)?;

    for path in loadable {
        let table = config.table_for(path);
        match store::load_file(&conn, path, &table) {
            Ok(rows) => info!(file = %path.display(), table, rows, "loaded"),
            Err(e) => error!(file = %path.display(), table, "load failed: {e:#}"),
        }
    }

    // ─── 6) answer the reporting questions ───────────────────────────
    info!(
        "there are {} unique users",
        store::questions::distinct_user_count(&conn)?
    );
    info!(
        "the distinct ad providers are {:?}",
        store::questions::distinct_providers(&conn)?
    );
    match store::questions::most_changed_property(&conn)? {
        Some(property) => info!("the most changed property is {property}"),
        None => info!("no user property changes loaded"),
    }

    let report_date = NaiveDate::from_ymd_opt(2019, 7, 3).context("building report date")?;
    info!(
        "{} users were shown a Snapchat ad on {report_date}",
        store::questions::impressions_on(&conn, "Snapchat", report_date)?
    );
    match store::questions::top_ad_for_audience(&conn, "POLITICS", "MODERATE")? {
        Some(ad) => info!("the most shown ad to moderates is {ad}"),
        None => info!("no ads shown to moderates"),
    }
    info!(
        "the 5 most successful ads are {:?}",
        store::questions::top_ads_by_reach(&conn, 5)?
    );

    info!("all done");
    Ok(())
}
