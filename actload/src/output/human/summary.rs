use std::fmt::Write as _;

use actload_core::LatencyStats;
use actload_core::runner::RunOutcome;

use super::format::*;

const INDENT: &str = " ";

pub(crate) fn render(outcome: &RunOutcome) -> String {
    let s = &outcome.summary;
    let mut out = String::new();

    out.push('\n');
    writeln!(out, "{INDENT}Test Results:").ok();
    writeln!(out, "{INDENT}============").ok();
    out.push('\n');

    writeln!(out, "{INDENT}Total Requests: {}", s.requests_total).ok();
    writeln!(out, "{INDENT}Request Rate:   {:.2} req/s", s.request_rate).ok();
    out.push('\n');

    render_latency(&mut out, "Response Time", s.overall.as_ref());

    match s.error_rate {
        Some(rate) => writeln!(out, "{INDENT}Error Rate: {}", format_pct(rate)).ok(),
        None => writeln!(out, "{INDENT}Error Rate: n/a").ok(),
    };
    out.push('\n');

    render_latency(&mut out, "Parse Endpoint Latency", s.parse.as_ref());
    render_latency(&mut out, "Run Endpoint Latency", s.run.as_ref());

    writeln!(
        out,
        "{INDENT}Iterations: {} (peak {} VUs, {})",
        s.iterations_total,
        s.vus_max,
        format_duration(s.run_duration)
    )
    .ok();
    writeln!(
        out,
        "{INDENT}Data: recv {} sent {}",
        format_bytes(s.bytes_received_total),
        format_bytes(s.bytes_sent_total)
    )
    .ok();
    out.push('\n');

    if !s.transport_errors.is_empty() {
        writeln!(out, "{INDENT}Transport Errors:").ok();
        for (kind, count) in &s.transport_errors {
            writeln!(out, "{INDENT}  {kind}: {count}").ok();
        }
        out.push('\n');
    }

    if !s.checks.is_empty() {
        writeln!(out, "{INDENT}Checks:").ok();
        for c in &s.checks {
            let mark = if c.fails == 0 { "ok  " } else { "FAIL" };
            writeln!(
                out,
                "{INDENT}  {mark} {} ({}/{} passed)",
                c.name,
                c.passes,
                c.total()
            )
            .ok();
        }
        out.push('\n');
    }

    if !outcome.thresholds.is_empty() {
        writeln!(out, "{INDENT}Thresholds:").ok();
        for t in &outcome.thresholds {
            let mark = if t.ok { "ok  " } else { "FAIL" };
            let observed = t
                .observed
                .map_or_else(|| "no data".to_string(), |v| format!("observed {v:.4}"));
            writeln!(
                out,
                "{INDENT}  {mark} {}: {} ({observed})",
                t.metric, t.expression
            )
            .ok();
        }
        out.push('\n');
    }

    out
}

fn render_latency(out: &mut String, title: &str, stats: Option<&LatencyStats>) {
    let Some(l) = stats else {
        writeln!(out, "{INDENT}{title}: n/a").ok();
        out.push('\n');
        return;
    };

    writeln!(out, "{INDENT}{title}:").ok();
    for (label, v) in [
        ("Min", l.min),
        ("Avg", l.avg),
        ("P50", l.p50),
        ("P95", l.p95),
        ("P99", l.p99),
        ("Max", l.max),
    ] {
        writeln!(out, "{INDENT}  {label}:  {}", format_ms(v)).ok();
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use actload_core::{
        CheckCounts, EndpointKind, RunSummary, Sample, ThresholdSet, evaluate_thresholds,
    };
    use actload_http::HttpTransportErrorKind;

    fn outcome(samples: &[Sample], checks: BTreeMap<String, CheckCounts>) -> RunOutcome {
        let summary = RunSummary::from_parts(
            samples,
            &checks,
            Vec::new(),
            1,
            Duration::from_secs(2),
        );
        let thresholds = evaluate_thresholds(
            &[ThresholdSet::new("http_req_duration", ["p(95)<300"])],
            &summary.metrics,
        )
        .unwrap_or_else(|e| panic!("{e}"));
        RunOutcome {
            summary,
            thresholds,
        }
    }

    fn sample(kind: EndpointKind, ms: u64) -> Sample {
        Sample {
            kind,
            duration: Duration::from_millis(ms),
            success: true,
            status: Some(200),
            transport_error: None,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    #[test]
    fn renders_headline_numbers_with_two_decimals() {
        let samples = [
            sample(EndpointKind::Parse, 10),
            sample(EndpointKind::Parse, 20),
            sample(EndpointKind::Parse, 30),
            sample(EndpointKind::Run, 200),
        ];
        let checks = BTreeMap::from([(
            "parse: status is 200".to_string(),
            CheckCounts {
                passes: 3,
                fails: 0,
            },
        )]);
        let text = render(&outcome(&samples, checks));

        assert!(text.contains(" Total Requests: 4\n"), "{text}");
        assert!(text.contains(" Request Rate:   2.00 req/s\n"), "{text}");
        assert!(text.contains(" Response Time:\n   Min:  10.00 ms\n"), "{text}");
        assert!(text.contains("   Max:  200.00 ms\n"), "{text}");
        assert!(text.contains(" Error Rate: 0.00%\n"), "{text}");
        assert!(
            text.contains(
                " Parse Endpoint Latency:\n   Min:  10.00 ms\n   Avg:  20.00 ms\n   P50:  20.00 ms\n   P95:  29.00 ms\n   P99:  29.80 ms\n   Max:  30.00 ms\n"
            ),
            "{text}"
        );
        assert!(
            text.contains(
                " Run Endpoint Latency:\n   Min:  200.00 ms\n   Avg:  200.00 ms\n   P50:  200.00 ms\n   P95:  200.00 ms\n   P99:  200.00 ms\n   Max:  200.00 ms\n"
            ),
            "{text}"
        );
        assert!(text.contains("ok   parse: status is 200 (3/3 passed)"), "{text}");
        assert!(text.contains("ok   http_req_duration: p(95)<300"), "{text}");
        assert!(!text.contains("Transport Errors:"), "{text}");
    }

    #[test]
    fn transport_failures_are_broken_down_by_kind() {
        let timed_out = Sample {
            success: false,
            status: None,
            transport_error: Some(HttpTransportErrorKind::Timeout),
            ..sample(EndpointKind::Run, 5_000)
        };
        let refused = Sample {
            transport_error: Some(HttpTransportErrorKind::Connect),
            ..timed_out.clone()
        };
        let samples = [timed_out.clone(), timed_out, refused];

        let text = render(&outcome(&samples, BTreeMap::new()));
        assert!(
            text.contains(" Transport Errors:\n   connect: 1\n   timeout: 2\n"),
            "{text}"
        );
    }

    #[test]
    fn empty_run_prints_not_available_sections() {
        let text = render(&outcome(&[], BTreeMap::new()));
        assert!(text.contains(" Total Requests: 0\n"), "{text}");
        assert!(text.contains(" Response Time: n/a\n"), "{text}");
        assert!(text.contains(" Error Rate: n/a\n"), "{text}");
        assert!(text.contains(" Parse Endpoint Latency: n/a\n"), "{text}");
        assert!(text.contains(" Run Endpoint Latency: n/a\n"), "{text}");
        assert!(text.contains("FAIL http_req_duration: p(95)<300 (no data)"), "{text}");
    }
}
