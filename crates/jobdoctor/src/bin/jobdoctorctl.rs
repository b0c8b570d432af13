use jobdoctor::analysis::Severity;
use jobdoctor::db;
use jobdoctor::jobs::JobId;
use jobdoctor::reports::{JobReport, PgReportStore, ReportStore};
use sqlx::PgPool;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "jobdoctorctl <command>\n\
             Commands:\n\
             - migrate\n\
             - reset\n\
             - recent [n]\n\
             - show <job_id>\n\
             - counts\n\
             \n\
             Uses DATABASE_URL or TEST_DATABASE_URL.\n"
        );
        std::process::exit(2);
    }

    dotenvy::dotenv().ok();
    let url = env::var("DATABASE_URL")
        .or_else(|_| env::var("TEST_DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL or TEST_DATABASE_URL must be set"))?;

    let pool = db::make_pool(&url, &db::PoolSettings::from_env()).await?;
    let store = PgReportStore::new(pool.clone());

    match args[1].as_str() {
        "migrate" => {
            db::run_migrations(&pool).await?;
            println!("migrations OK");
        }
        "reset" => reset(&pool).await?,
        "recent" => {
            let n: i64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(20);
            for report in store.list_recent(n).await? {
                println!(
                    "{:<10} {}  {}  {} ({})",
                    report.severity,
                    report.analysis_time.format("%Y-%m-%d %H:%M:%S"),
                    report.job_id,
                    report.name,
                    report.owner
                );
            }
        }
        "show" => {
            let id = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("usage: jobdoctorctl show <job_id>"))?;
            match store.find_by_id(&JobId::new(id.as_str())).await? {
                Some(report) => print_report(&report),
                None => {
                    eprintln!("no report for job {id}");
                    std::process::exit(1);
                }
            }
        }
        "counts" => show_counts(&pool).await?,
        other => {
            eprintln!("Unknown command: {other}");
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn reset(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query("TRUNCATE TABLE job_report_findings, job_reports")
        .execute(pool)
        .await?;

    println!("reset OK");
    Ok(())
}

async fn show_counts(pool: &PgPool) -> anyhow::Result<()> {
    let rows: Vec<(i16, i64)> = sqlx::query_as(
        r#"
        SELECT severity, COUNT(*)::bigint
        FROM job_reports
        GROUP BY severity
        ORDER BY severity
        "#,
    )
    .fetch_all(pool)
    .await?;

    for (value, count) in rows {
        let label = Severity::from_value(value)
            .map(|s| s.as_str())
            .unwrap_or("?");
        println!("{label:<10} {count}");
    }
    Ok(())
}

fn print_report(report: &JobReport) {
    println!("job:      {}", report.job_id);
    println!("name:     {}", report.name);
    println!("owner:    {}", report.owner);
    println!("url:      {}", report.url);
    println!("started:  {}", report.start_time.to_rfc3339());
    println!("analysed: {}", report.analysis_time.to_rfc3339());
    println!("severity: {}", report.severity);

    for finding in &report.findings {
        println!("\n== {} [{}]", finding.analysis, finding.severity);
        for row in &finding.detail {
            println!("   {}", row.join(" | "));
        }
    }
}
