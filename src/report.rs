use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::comparison::ComparisonReport;
use crate::dashboard::DashboardOverview;
use crate::error::Result;
use crate::issues::DetectedIssue;
use crate::kpi::{KpiSnapshot, WowDelta};
use crate::response::ResponseTimeMetrics;
use crate::spikes::{IssueSpike, Lift};

/// Everything the property report covers.
pub struct ReportInputs<'a> {
    pub scope: Option<&'a str>,
    pub generated_at: DateTime<Utc>,
    pub overview: &'a DashboardOverview,
    pub issues: &'a [DetectedIssue],
    pub spikes: &'a [IssueSpike],
    pub response: &'a ResponseTimeMetrics,
}

fn format_rating(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"))
}

fn format_percent(value: Option<u32>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v}%"))
}

fn format_days(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1} days"))
}

fn format_delta(delta: Option<&WowDelta>) -> String {
    match delta {
        Some(delta) => format!("{:+.1}%", delta.percent_change),
        None => "n/a".to_string(),
    }
}

pub fn format_lift(lift: Lift) -> String {
    match lift {
        Lift::Finite(value) => format!("{value:.2}x"),
        Lift::Unbounded => "new".to_string(),
    }
}

fn write_kpis(output: &mut String, label: &str, kpis: &KpiSnapshot) {
    let _ = writeln!(
        output,
        "- {}: {} reviews, avg rating {}, {} positive, {}% approved",
        label,
        kpis.count,
        format_rating(kpis.avg_rating),
        format_percent(kpis.percent_positive),
        kpis.percent_approved
    );
}

pub fn build_report(inputs: &ReportInputs<'_>) -> String {
    let overview = inputs.overview;
    let mut output = String::new();
    let scope_label = inputs.scope.unwrap_or("all properties");

    let _ = writeln!(output, "# Review Pulse Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        scope_label,
        inputs.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Headline KPIs");
    write_kpis(&mut output, "Last 30 days", &overview.kpis_30);
    write_kpis(&mut output, "Last 90 days", &overview.kpis_90);

    let wow = &overview.week_over_week;
    let _ = writeln!(
        output,
        "- This week: {} reviews ({} vs last week), avg rating {} ({}), {} positive ({})",
        wow.current.count,
        format_delta(wow.count_delta.as_ref()),
        format_rating(wow.current.avg_rating),
        format_delta(wow.avg_delta.as_ref()),
        format_percent(wow.current.percent_positive),
        format_delta(wow.pos_pct_delta.as_ref())
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Rated Categories");
    if overview.top_categories.is_empty() {
        let _ = writeln!(output, "No category ratings in this window.");
    } else {
        for category in &overview.top_categories {
            let _ = writeln!(output, "- {}: {} ratings", category.category, category.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recurring Issues");
    if inputs.issues.is_empty() {
        let _ = writeln!(output, "No recurring issues detected.");
    } else {
        for issue in inputs.issues {
            let _ = writeln!(
                output,
                "- [{:?}] {} / \"{}\": {} mentions, avg rating {}",
                issue.severity,
                issue.category,
                issue.keyword,
                issue.frequency,
                format_rating(issue.avg_rating)
            );
            for example in &issue.examples {
                let _ = writeln!(output, "  > {example}");
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Issue Spikes");
    if inputs.spikes.is_empty() {
        let _ = writeln!(output, "No categories are spiking.");
    } else {
        for spike in inputs.spikes {
            let _ = writeln!(
                output,
                "- [{:?}] {}: {} low ratings recently vs {:.2}/week baseline (lift {})",
                spike.severity,
                spike.category,
                spike.recent_low_count,
                spike.baseline_weekly_avg,
                format_lift(spike.lift_ratio)
            );
        }
    }

    let response = inputs.response;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Approval Turnaround");
    let _ = writeln!(output, "- Approval rate: {}%", response.approval_rate);
    let _ = writeln!(output, "- Average: {}", format_days(response.avg_response_time));
    let _ = writeln!(output, "- Median: {}", format_days(response.median_response_time));
    let _ = writeln!(
        output,
        "- Range: {} to {}",
        format_days(response.fastest_response),
        format_days(response.slowest_response)
    );

    output
}

/// Markdown table of the multi-property comparison.
pub fn comparison_markdown(report: &ComparisonReport) -> String {
    let mut output = String::new();
    let meta = &report.meta;

    let _ = writeln!(output, "# Property Comparison");
    let _ = writeln!(
        output,
        "{} properties, {} reviews, {}% average approval rate ({})",
        meta.total_properties,
        meta.total_reviews,
        meta.avg_approval_rate,
        meta.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);

    if report.data.is_empty() {
        let _ = writeln!(output, "No properties found.");
        return output;
    }

    let _ = writeln!(
        output,
        "| Property | Reviews | Avg rating | Approved | Response | Trend | Last 30 days \
         | Top issues |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|---|");
    for property in &report.data {
        let issues: Vec<String> = property
            .top_issues
            .iter()
            .map(|t| format!("{} ({:.1})", t.category, t.avg_rating))
            .collect();
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} ({}%) | {} | {:?} | {} @ {} | {} |",
            property.name,
            property.total_reviews,
            format_rating(property.avg_rating),
            property.approved_count,
            property.approval_rate,
            format_days(property.avg_response_time),
            property.recent_trend,
            property.last_30_days.reviews,
            format_rating(property.last_30_days.avg_rating),
            if issues.is_empty() {
                "-".to_string()
            } else {
                issues.join(", ")
            }
        );
    }

    output
}

#[derive(Serialize)]
struct ComparisonCsvRow<'a> {
    slug: &'a str,
    name: &'a str,
    total_reviews: usize,
    avg_rating: Option<f64>,
    approved_count: usize,
    approval_rate: u32,
    avg_response_time: Option<f64>,
    recent_trend: String,
    last_30_reviews: usize,
    last_30_avg_rating: Option<f64>,
    top_issues: String,
}

/// One CSV row per property, in ranking order.
pub fn write_comparison_csv<W: std::io::Write>(report: &ComparisonReport, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for property in &report.data {
        csv_writer.serialize(ComparisonCsvRow {
            slug: &property.slug,
            name: &property.name,
            total_reviews: property.total_reviews,
            avg_rating: property.avg_rating,
            approved_count: property.approved_count,
            approval_rate: property.approval_rate,
            avg_response_time: property.avg_response_time,
            recent_trend: format!("{:?}", property.recent_trend).to_lowercase(),
            last_30_reviews: property.last_30_days.reviews,
            last_30_avg_rating: property.last_30_days.avg_rating,
            top_issues: property
                .top_issues
                .iter()
                .map(|t| t.category.as_str())
                .collect::<Vec<_>>()
                .join(";"),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::{
        CategoryTally, ComparisonMeta, PropertySummary, RatingTrend, RecentSummary,
    };
    use crate::dashboard::overview;
    use crate::issues::Severity;
    use crate::series::TrendMode;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    fn comparison() -> ComparisonReport {
        ComparisonReport {
            data: vec![PropertySummary {
                id: Uuid::nil(),
                name: "Camden Flat".to_string(),
                slug: "camden-flat".to_string(),
                total_reviews: 12,
                avg_rating: Some(8.4),
                approved_count: 3,
                approval_rate: 25,
                avg_response_time: Some(1.5),
                top_issues: vec![CategoryTally {
                    category: "cleanliness".to_string(),
                    count: 4,
                    avg_rating: 6.5,
                }],
                recent_trend: RatingTrend::Down,
                last_30_days: RecentSummary {
                    reviews: 4,
                    avg_rating: Some(7.9),
                },
            }],
            meta: ComparisonMeta {
                total_properties: 1,
                total_reviews: 12,
                avg_approval_rate: 25,
                generated_at: now(),
            },
        }
    }

    #[test]
    fn empty_report_has_placeholders() {
        let view = overview(&[], now(), TrendMode::Smoothed);
        let response = ResponseTimeMetrics::empty();
        let report = build_report(&ReportInputs {
            scope: Some("camden-flat"),
            generated_at: now(),
            overview: &view,
            issues: &[],
            spikes: &[],
            response: &response,
        });

        assert!(report.contains("Generated for camden-flat on 2026-10-01 12:00 UTC"));
        assert!(report.contains("No recurring issues detected."));
        assert!(report.contains("No categories are spiking."));
        assert!(report.contains("- Average: n/a"));
    }

    #[test]
    fn report_lists_issues_and_spikes() {
        let view = overview(&[], now(), TrendMode::Raw);
        let response = ResponseTimeMetrics::empty();
        let issues = vec![DetectedIssue {
            category: "Noise".to_string(),
            keyword: "loud".to_string(),
            frequency: 3,
            avg_rating: Some(4.0),
            severity: Severity::Medium,
            examples: vec!["Very loud street...".to_string()],
        }];
        let spikes = vec![IssueSpike {
            category: "wifi".to_string(),
            recent_low_count: 4,
            baseline_weekly_avg: 0.0,
            lift_ratio: Lift::Unbounded,
            severity: Severity::High,
        }];
        let report = build_report(&ReportInputs {
            scope: None,
            generated_at: now(),
            overview: &view,
            issues: &issues,
            spikes: &spikes,
            response: &response,
        });

        assert!(report.contains("all properties"));
        assert!(report.contains("- [Medium] Noise / \"loud\": 3 mentions, avg rating 4.0"));
        assert!(report.contains("  > Very loud street..."));
        assert!(report.contains("(lift new)"));
    }

    #[test]
    fn comparison_table_has_one_row_per_property() {
        let markdown = comparison_markdown(&comparison());
        assert!(markdown.contains("1 properties, 12 reviews, 25% average approval rate"));
        assert!(markdown.contains(
            "| Camden Flat | 12 | 8.4 | 3 (25%) | 1.5 days | Down | 4 @ 7.9 | cleanliness (6.5) |"
        ));
    }

    #[test]
    fn comparison_csv_has_header_and_rows() {
        let mut buffer = Vec::new();
        write_comparison_csv(&comparison(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(
                "slug,name,total_reviews,avg_rating,approved_count,approval_rate,\
                 avg_response_time,recent_trend,last_30_reviews,last_30_avg_rating,top_issues"
            )
        );
        assert_eq!(
            lines.next(),
            Some("camden-flat,Camden Flat,12,8.4,3,25,1.5,down,4,7.9,cleanliness")
        );
    }

    #[test]
    fn json_output_uses_snake_case_fields() {
        let json = to_json(&comparison()).unwrap();
        assert!(json.contains("\"avg_approval_rate\": 25"));
        assert!(json.contains("\"recent_trend\": \"down\""));
    }
}
