use tracing::warn;

use crate::error::{Error, Result};
use crate::metrics::{MetricSeries, MetricValues, find_series};

/// Expressions that all have to hold for one metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSet {
    pub metric: String,
    pub expressions: Vec<String>,
}

impl ThresholdSet {
    pub fn new<I, S>(metric: impl Into<String>, expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metric: metric.into(),
            expressions: expressions.into_iter().map(Into::into).collect(),
        }
    }

    /// Fails on the first expression that does not parse.
    pub fn validate(&self) -> Result<()> {
        for raw in &self.expressions {
            parse_threshold_expr(raw).map_err(Error::InvalidThreshold)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdAgg {
    Avg,
    Min,
    Max,
    Med,
    Count,
    Rate,
    P(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExpr {
    pub agg: ThresholdAgg,
    pub op: ThresholdOp,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdOutcome {
    pub metric: String,
    pub expression: String,
    /// `None` when the metric or aggregate has no data.
    pub observed: Option<f64>,
    pub ok: bool,
}

pub fn parse_threshold_expr(raw: &str) -> std::result::Result<ThresholdExpr, String> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err("empty threshold".to_string());
    }

    // Two-character operators first so `<=` is not read as `<`.
    let ops = [
        ("<=", ThresholdOp::Lte),
        (">=", ThresholdOp::Gte),
        ("==", ThresholdOp::Eq),
        ("<", ThresholdOp::Lt),
        (">", ThresholdOp::Gt),
    ];
    let (op_pos, op_len, op) = ops
        .iter()
        .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
        .ok_or_else(|| format!("invalid threshold (missing operator): {raw}"))?;

    let (left, right_with_op) = s.split_at(op_pos);
    let right = &right_with_op[op_len..];
    if left.is_empty() || right.is_empty() {
        return Err(format!("invalid threshold: {raw}"));
    }

    let agg = match left.to_ascii_lowercase().as_str() {
        "avg" => ThresholdAgg::Avg,
        "min" => ThresholdAgg::Min,
        "max" => ThresholdAgg::Max,
        "med" => ThresholdAgg::Med,
        "count" => ThresholdAgg::Count,
        "rate" => ThresholdAgg::Rate,
        other => {
            let Some(inner) = other.strip_prefix("p(").and_then(|v| v.strip_suffix(')')) else {
                return Err(format!("unknown aggregation `{left}` in threshold: {raw}"));
            };
            let p: f64 = inner
                .parse()
                .map_err(|_| format!("invalid percentile in threshold: {raw}"))?;
            if !(p > 0.0 && p <= 100.0) {
                return Err(format!("percentile out of range in threshold: {raw}"));
            }
            ThresholdAgg::P(p)
        }
    };

    let value: f64 = right
        .parse()
        .map_err(|_| format!("invalid numeric value in threshold: {raw}"))?;

    Ok(ThresholdExpr { agg, op, value })
}

/// Evaluates every expression; a missing series or aggregate counts as a failure.
pub fn evaluate_thresholds(
    thresholds: &[ThresholdSet],
    metrics: &[MetricSeries],
) -> Result<Vec<ThresholdOutcome>> {
    let mut out = Vec::new();

    for set in thresholds {
        let series = find_series(metrics, &set.metric);

        for expr_raw in &set.expressions {
            let expr = parse_threshold_expr(expr_raw).map_err(Error::InvalidThreshold)?;
            let observed = series.and_then(|s| observed_value(&s.values, expr.agg));
            let ok = observed.is_some_and(|v| compare(v, expr.op, expr.value));
            if !ok {
                warn!(
                    metric = %set.metric,
                    expression = %expr_raw,
                    ?observed,
                    "threshold crossed"
                );
            }
            out.push(ThresholdOutcome {
                metric: set.metric.clone(),
                expression: expr_raw.clone(),
                observed,
                ok,
            });
        }
    }

    Ok(out)
}

pub fn violations(outcomes: &[ThresholdOutcome]) -> impl Iterator<Item = &ThresholdOutcome> {
    outcomes.iter().filter(|o| !o.ok)
}

fn compare(left: f64, op: ThresholdOp, right: f64) -> bool {
    match op {
        ThresholdOp::Lt => left < right,
        ThresholdOp::Lte => left <= right,
        ThresholdOp::Gt => left > right,
        ThresholdOp::Gte => left >= right,
        ThresholdOp::Eq => left == right,
    }
}

fn observed_value(values: &MetricValues, agg: ThresholdAgg) -> Option<f64> {
    match (values, agg) {
        (MetricValues::Trend(trend), ThresholdAgg::Count) => Some(trend.len() as f64),
        (MetricValues::Trend(trend), ThresholdAgg::Avg) => trend.stats().map(|s| s.avg),
        (MetricValues::Trend(trend), ThresholdAgg::Min) => trend.stats().map(|s| s.min),
        (MetricValues::Trend(trend), ThresholdAgg::Max) => trend.stats().map(|s| s.max),
        (MetricValues::Trend(trend), ThresholdAgg::Med) => trend.percentile(50.0),
        (MetricValues::Trend(trend), ThresholdAgg::P(p)) => trend.percentile(p),

        (MetricValues::Counter { value, .. }, ThresholdAgg::Count) => Some(*value),
        (MetricValues::Counter { rate, .. }, ThresholdAgg::Rate) => Some(*rate),

        (MetricValues::Gauge { value, .. }, ThresholdAgg::Avg) => Some(*value),
        (MetricValues::Gauge { min, .. }, ThresholdAgg::Min) => Some(*min),
        (MetricValues::Gauge { max, .. }, ThresholdAgg::Max) => Some(*max),

        (v @ MetricValues::Rate { .. }, ThresholdAgg::Rate) => v.rate(),
        (MetricValues::Rate { passes, fails }, ThresholdAgg::Count) => {
            Some(passes.saturating_add(*fails) as f64)
        }

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Contains, Trend};

    #[test]
    fn parse_threshold_expr_trims_whitespace() {
        let expr = parse_threshold_expr("  avg  <=  123  ").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(expr.agg, ThresholdAgg::Avg);
        assert_eq!(expr.op, ThresholdOp::Lte);
        assert_eq!(expr.value, 123.0);
    }

    #[test]
    fn parse_threshold_expr_accepts_fractional_percentiles() {
        let expr = parse_threshold_expr("p(99.9)<500").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(expr.agg, ThresholdAgg::P(99.9));
        assert_eq!(expr.op, ThresholdOp::Lt);
    }

    #[test]
    fn parse_threshold_expr_rejects_bad_input() {
        for raw in ["p(101)<1", "p(0)<1", "avg", "bogus<1", "rate<abc", "<1"] {
            assert!(parse_threshold_expr(raw).is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn evaluate_thresholds_flags_missing_series() {
        let thresholds = vec![ThresholdSet::new("does_not_exist", ["avg>0"])];

        let outcomes = evaluate_thresholds(&thresholds, &[]).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].ok);
        assert_eq!(outcomes[0].observed, None);
    }

    #[test]
    fn empty_trend_fails_percentile_threshold() {
        let thresholds = vec![ThresholdSet::new("http_req_duration", ["p(95)<300"])];
        let metrics = vec![MetricSeries::new(
            "http_req_duration",
            Contains::Time,
            MetricValues::Trend(Trend::default()),
        )];
        let outcomes =
            evaluate_thresholds(&thresholds, &metrics).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(violations(&outcomes).count(), 1);
    }

    #[test]
    fn p95_passes_when_all_latencies_are_fast() {
        let thresholds = vec![ThresholdSet::new("http_req_duration", ["p(95)<300", "med<=100"])];
        let metrics = vec![MetricSeries::new(
            "http_req_duration",
            Contains::Time,
            MetricValues::Trend(Trend::from_ms((1..=100).map(f64::from).collect())),
        )];
        let outcomes =
            evaluate_thresholds(&thresholds, &metrics).unwrap_or_else(|e| panic!("{e}"));
        assert!(outcomes.iter().all(|o| o.ok), "{outcomes:?}");
    }

    #[test]
    fn rate_threshold_uses_share_of_true_values() {
        let thresholds = vec![ThresholdSet::new("errors", ["rate<0.01"])];
        let metrics = vec![MetricSeries::new(
            "errors",
            Contains::Default,
            MetricValues::Rate {
                passes: 2,
                fails: 98,
            },
        )];
        let outcomes =
            evaluate_thresholds(&thresholds, &metrics).unwrap_or_else(|e| panic!("{e}"));
        assert!(!outcomes[0].ok);
        assert_eq!(outcomes[0].observed, Some(0.02));
    }

    #[test]
    fn validate_reports_bad_expression() {
        let set = ThresholdSet::new("errors", ["rate<0.01", "nope"]);
        assert!(matches!(set.validate(), Err(Error::InvalidThreshold(_))));
    }
}
