use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use review_pulse::comparison;
use review_pulse::dashboard;
use review_pulse::db::{self, PgStore};
use review_pulse::issues::detect_recurring_issues;
use review_pulse::logging;
use review_pulse::models::{ReviewFilter, ReviewStatus};
use review_pulse::normalize::{self, NormalizedProperty};
use review_pulse::rating::{effective_rating, sort_reviews, ReviewSort};
use review_pulse::report::{self, ReportInputs};
use review_pulse::response::calculate_response_time_metrics;
use review_pulse::series::{days_before, TrendMode};
use review_pulse::spikes::{detect_issue_spikes, split_windows, MAX_WINDOW_DAYS};
use review_pulse::{AppConfig, MemoryStore, ReviewStore};

#[derive(Parser)]
#[command(name = "review-pulse")]
#[command(
    about = "Guest review analytics and website approval for short-let properties",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to review-pulse.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Analyse a Hostaway export in memory instead of querying Postgres
    #[arg(long, global = true)]
    offline: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import reviews from a Hostaway reviews payload
    ImportHostaway {
        #[arg(long)]
        json: PathBuf,
    },
    /// Import reviews from a Google Places details payload
    ImportGoogle {
        #[arg(long)]
        json: PathBuf,
        /// Slug of the property the place belongs to
        #[arg(long)]
        property: String,
        /// Display name used when the property does not exist yet
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        place_id: String,
    },
    /// Approve a review for the website, or revoke the approval
    Approve {
        #[arg(long)]
        review: Uuid,
        #[arg(long)]
        revoke: bool,
    },
    /// Dashboard KPIs, week-over-week deltas and volume trends
    Overview {
        #[arg(long)]
        property: Option<String>,
        #[arg(long, value_enum, default_value_t = TrendMode::Smoothed)]
        trend: TrendMode,
        #[arg(long)]
        json: bool,
    },
    /// Recurring complaint keywords in review text
    Issues {
        #[arg(long)]
        property: Option<String>,
        /// Number of most recent reviews to scan
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Categories with a recent jump in low ratings
    Spikes {
        #[arg(long)]
        property: Option<String>,
        #[arg(long)]
        recent_days: Option<u32>,
        #[arg(long)]
        baseline_days: Option<u32>,
    },
    /// Compare every property side by side
    Compare {
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        property: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// List known categories and channels
    Facets,
    /// Approval turnaround statistics
    ResponseTimes {
        #[arg(long)]
        property: Option<String>,
    },
    /// List reviews matching a filter
    Reviews {
        #[arg(long)]
        property: Option<String>,
        #[arg(long)]
        channel: Option<String>,
        #[arg(long, value_enum)]
        status: Option<ReviewStatus>,
        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        min_rating: Option<f64>,
        #[arg(long)]
        max_rating: Option<f64>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long = "category")]
        categories: Vec<String>,
        #[arg(long)]
        approved: Option<bool>,
        #[arg(long, value_enum, default_value_t = ReviewSort::DateDesc)]
        sort: ReviewSort,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config =
        AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    logging::init(&config.logging);
    let now = Utc::now();

    if let Some(path) = &cli.offline {
        let store = load_offline(path)?;
        return run_query(&store, cli.command, &config, now).await;
    }

    let database_url = config.database_url()?;
    let pool = db::connect(database_url, &config.database)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::ImportHostaway { json } => {
            let payload = read_payload(&json)?;
            let reviews = normalize::normalize_hostaway(&payload)
                .with_context(|| format!("failed to normalize {}", json.display()))?;
            let summary = db::upsert_reviews(&pool, &reviews).await?;
            println!(
                "Imported {} reviews from {} ({} new, {} updated).",
                reviews.len(),
                json.display(),
                summary.inserted,
                summary.updated
            );
        }
        Commands::ImportGoogle {
            json,
            property,
            name,
            place_id,
        } => {
            let payload = read_payload(&json)?;
            let target = NormalizedProperty {
                name: name.unwrap_or_else(|| property.clone()),
                slug: property,
            };
            let (place, reviews) = normalize::normalize_google(&payload, &place_id, &target)
                .with_context(|| format!("failed to normalize {}", json.display()))?;
            let summary = db::upsert_reviews(&pool, &reviews).await?;
            db::set_google_place_id(&pool, &target.slug, &place_id).await?;
            println!(
                "Imported {} Google reviews for {} ({} new, {} updated).",
                reviews.len(),
                target.slug,
                summary.inserted,
                summary.updated
            );
            if let Some(rating) = place.rating {
                println!(
                    "Place rating {:.1} across {} ratings.",
                    rating,
                    place.user_ratings_total.unwrap_or(0)
                );
            }
        }
        Commands::Approve { review, revoke } => {
            let state = db::set_approval(&pool, review, !revoke, now).await?;
            if state.approved {
                println!("Review {review} approved for the website.");
            } else {
                println!("Review {review} removed from the website.");
            }
        }
        command => run_query(&PgStore::new(pool), command, &config, now).await?,
    }

    Ok(())
}

fn read_payload(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_offline(path: &Path) -> anyhow::Result<MemoryStore> {
    let payload = read_payload(path)?;
    let reviews = normalize::normalize_hostaway(&payload)
        .with_context(|| format!("failed to normalize {}", path.display()))?;
    let mut store = MemoryStore::new();
    let inserted = store.ingest(reviews);
    tracing::info!(reviews = inserted, path = %path.display(), "loaded offline store");
    Ok(store)
}

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Last instant of `day`.
fn day_end(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN)
        .and_utc()
        .checked_add_days(chrono::Days::new(1))
        .and_then(|next| next.checked_sub_signed(chrono::Duration::nanoseconds(1)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn print_or_write(contents: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Written to {}.", path.display());
        }
        None => print!("{contents}"),
    }
    Ok(())
}

async fn run_query<S: ReviewStore>(
    store: &S,
    command: Commands,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let analytics = &config.analytics;

    match command {
        Commands::InitDb
        | Commands::ImportHostaway { .. }
        | Commands::ImportGoogle { .. }
        | Commands::Approve { .. } => {
            bail!("this command writes to Postgres and cannot run with --offline");
        }
        Commands::Overview {
            property,
            trend,
            json,
        } => {
            let filter = ReviewFilter::for_property(property.as_deref())
                .since(days_before(now, i64::from(dashboard::LONG_WINDOW_DAYS)))
                .with_limit(analytics.fetch_limit);
            let reviews = store.fetch_reviews(&filter).await?;
            let view = dashboard::overview(&reviews, now, trend);

            if json {
                println!("{}", report::to_json(&view)?);
                return Ok(());
            }

            for (label, kpis) in [("30 days", &view.kpis_30), ("90 days", &view.kpis_90)] {
                println!(
                    "{label}: {} reviews, avg {}, positive {}, approved {}%",
                    kpis.count,
                    kpis.avg_rating
                        .map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}")),
                    kpis.percent_positive
                        .map_or_else(|| "n/a".to_string(), |v| format!("{v}%")),
                    kpis.percent_approved
                );
            }
            let wow = &view.week_over_week;
            match &wow.count_delta {
                Some(delta) => println!(
                    "This week: {} reviews ({:+.1}%, {:?})",
                    wow.current.count, delta.percent_change, delta.direction
                ),
                None => println!("This week: {} reviews", wow.current.count),
            }
            let peak = view.trend_30.iter().cloned().fold(0.0_f64, f64::max);
            println!("30-day {:?} trend peak: {:.1}", view.trend_mode, peak);
            for category in &view.top_categories {
                println!("- {}: {} ratings", category.category, category.count);
            }
        }
        Commands::Issues { property, limit } => {
            let filter = ReviewFilter::for_property(property.as_deref())
                .with_limit(limit.unwrap_or(analytics.issue_sample_limit));
            let reviews = store.fetch_reviews(&filter).await?;
            let issues = detect_recurring_issues(&reviews);

            if issues.is_empty() {
                println!("No recurring issues across {} reviews.", reviews.len());
                return Ok(());
            }
            println!("Recurring issues across {} reviews:", reviews.len());
            for issue in &issues {
                println!(
                    "- [{:?}] {} / {}: {} mentions",
                    issue.severity, issue.category, issue.keyword, issue.frequency
                );
            }
        }
        Commands::Spikes {
            property,
            recent_days,
            baseline_days,
        } => {
            let recent_days = recent_days.unwrap_or(analytics.recent_days);
            let baseline_days = baseline_days.unwrap_or(analytics.baseline_days);
            if recent_days == 0 || baseline_days == 0 {
                bail!("spike windows must be at least one day");
            }
            if recent_days > MAX_WINDOW_DAYS || baseline_days > MAX_WINDOW_DAYS {
                bail!("spike windows cannot exceed {MAX_WINDOW_DAYS} days");
            }
            let span = i64::from(recent_days) + i64::from(baseline_days);
            let filter = ReviewFilter::for_property(property.as_deref())
                .since(days_before(now, span))
                .with_limit(analytics.fetch_limit);
            let reviews = store.fetch_reviews(&filter).await?;
            let (recent, baseline) = split_windows(&reviews, now, recent_days, baseline_days);
            let spikes = detect_issue_spikes(&recent, &baseline, baseline_days);

            if spikes.is_empty() {
                println!("No spikes in the last {recent_days} days.");
                return Ok(());
            }
            for spike in &spikes {
                println!(
                    "- [{:?}] {}: {} low ratings, baseline {:.2}/week, lift {}",
                    spike.severity,
                    spike.category,
                    spike.recent_low_count,
                    spike.baseline_weekly_avg,
                    report::format_lift(spike.lift_ratio)
                );
            }
        }
        Commands::Compare { format, out } => {
            let properties = store.fetch_properties().await?;
            let comparison = comparison::summarize(&properties, now);
            let rendered = match format {
                OutputFormat::Markdown => report::comparison_markdown(&comparison),
                OutputFormat::Json => report::to_json(&comparison)? + "\n",
                OutputFormat::Csv => {
                    let mut buffer = Vec::new();
                    report::write_comparison_csv(&comparison, &mut buffer)?;
                    String::from_utf8(buffer).context("CSV output was not UTF-8")?
                }
            };
            print_or_write(&rendered, out.as_deref())?;
        }
        Commands::Report { property, out } => {
            let scoped = ReviewFilter::for_property(property.as_deref());
            let windowed = scoped
                .clone()
                .since(days_before(now, i64::from(dashboard::LONG_WINDOW_DAYS)))
                .with_limit(analytics.fetch_limit);
            let reviews = store.fetch_reviews(&windowed).await?;
            let view = dashboard::overview(&reviews, now, TrendMode::default());

            let sample = store
                .fetch_reviews(&scoped.clone().with_limit(analytics.issue_sample_limit))
                .await?;
            let issues = detect_recurring_issues(&sample);

            let span = i64::from(analytics.recent_days) + i64::from(analytics.baseline_days);
            let spike_reviews = store
                .fetch_reviews(
                    &scoped
                        .clone()
                        .since(days_before(now, span))
                        .with_limit(analytics.fetch_limit),
                )
                .await?;
            let (recent, baseline) =
                split_windows(&spike_reviews, now, analytics.recent_days, analytics.baseline_days);
            let spikes = detect_issue_spikes(&recent, &baseline, analytics.baseline_days);

            let all = store
                .fetch_reviews(&scoped.with_limit(analytics.fetch_limit))
                .await?;
            let response = calculate_response_time_metrics(&all);

            let contents = report::build_report(&ReportInputs {
                scope: property.as_deref(),
                generated_at: now,
                overview: &view,
                issues: &issues,
                spikes: &spikes,
                response: &response,
            });
            std::fs::write(&out, contents)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Facets => {
            let facets = store.facets().await?;
            println!("Categories: {}", facets.categories.join(", "));
            println!("Channels: {}", facets.channels.join(", "));
        }
        Commands::ResponseTimes { property } => {
            let filter =
                ReviewFilter::for_property(property.as_deref()).with_limit(analytics.fetch_limit);
            let reviews = store.fetch_reviews(&filter).await?;
            let metrics = calculate_response_time_metrics(&reviews);
            println!("{}", report::to_json(&metrics)?);
        }
        Commands::Reviews {
            property,
            channel,
            status,
            from,
            to,
            min_rating,
            max_rating,
            text,
            categories,
            approved,
            sort,
            limit,
        } => {
            let filter = ReviewFilter {
                property_slug: property,
                channel,
                status,
                submitted_from: from.map(day_start),
                submitted_to: to.map(day_end),
                min_rating,
                max_rating,
                text,
                categories,
                approved,
                limit: Some(analytics.fetch_limit),
            };
            let mut reviews = store.fetch_reviews(&filter).await?;
            sort_reviews(&mut reviews, sort);

            if reviews.is_empty() {
                println!("No reviews match.");
                return Ok(());
            }
            for review in reviews.iter().take(limit) {
                let rating = effective_rating(review)
                    .map_or_else(|| "-".to_string(), |v| format!("{v:.1}"));
                let excerpt: String = review.text.chars().take(60).collect();
                println!(
                    "{} {} [{}] {}{} {}",
                    review.id,
                    review.submitted_at.format("%Y-%m-%d"),
                    review.status.as_str(),
                    rating,
                    if review.is_approved() { " *" } else { "" },
                    excerpt
                );
            }
        }
    }

    Ok(())
}
