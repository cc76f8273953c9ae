//! Locus filtering: count the split alignments that pass a locus rule and
//! turn them into rates per million.

use config::{Fields, Locus, PPM_SCALE, SLICING_BOUNDARY, SP_WEIGHT, TRA_START};
use hashbrown::HashSet;
use log::debug;
use rayon::prelude::*;
use serde_json::Value;

use crate::core::aggregate::AggregatedTable;
use crate::core::parse::{parse_alignment_pairs, Interval, Orientation};
use crate::core::ReportError;

const SR: &str = "SR";
const SP: &str = "SP";

/// filtering parameters of one locus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocusRule {
    pub locus: Locus,
    /// orientations counted as split reads
    pub sr: &'static [Orientation],
    /// orientations counted as split read pairs
    pub sp: &'static [Orientation],
    pub sp_offset: i64,
    pub boundary: i64,
}

impl LocusRule {
    pub const TRA: LocusRule = LocusRule {
        locus: Locus::Tra,
        sr: &[Orientation('+', '+')],
        sp: &[Orientation('-', '+')],
        sp_offset: TRA_START,
        boundary: SLICING_BOUNDARY,
    };

    pub fn for_locus(locus: Locus) -> Result<LocusRule, ReportError> {
        match locus {
            Locus::Tra => Ok(Self::TRA),
            other => Err(ReportError::MissingRule(other)),
        }
    }

    pub fn columns(&self) -> [String; 3] {
        [
            self.locus.key("SR-PPM"),
            self.locus.key("SP-PPM"),
            self.locus.key("PPM"),
        ]
    }
}

/// split-read rates of one sample
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub sample_key: String,
    pub sr_ppm: f64,
    pub sp_ppm: f64,
    pub ppm: f64,
}

/// number of intervals that reach past `boundary` (after removing `offset`)
/// with an allowed orientation
///
/// With a zero offset and `require_descending_for_zero_offset` set, the
/// left midpoint must also lie after the right one.
pub fn count_qualifying(
    intervals: &[Interval],
    allowed: &HashSet<Orientation>,
    offset: i64,
    boundary: i64,
    require_descending_for_zero_offset: bool,
) -> usize {
    intervals
        .iter()
        .filter(|iv| reaches(iv.left, offset, boundary) || reaches(iv.right, offset, boundary))
        .filter(|iv| allowed.contains(&iv.orientation))
        .filter(|iv| !(require_descending_for_zero_offset && offset == 0) || iv.left > iv.right)
        .count()
}

/// `midpoint - offset > boundary`; the difference only overflows upwards
/// when `offset` is negative
fn reaches(midpoint: i64, offset: i64, boundary: i64) -> bool {
    midpoint
        .checked_sub(offset)
        .map_or(offset < 0, |distance| distance > boundary)
}

/// `count * 1e6 / total`, refusing a zero total
pub fn ppm(count: f64, total: f64, sample_key: &str, metric: &str) -> Result<f64, ReportError> {
    if total == 0.0 {
        return Err(ReportError::DivisionByZero {
            sample_key: sample_key.to_string(),
            metric: metric.to_string(),
        });
    }

    Ok(count * PPM_SCALE / total)
}

fn total(row: &Fields, sample_key: &str, field: String) -> Result<f64, ReportError> {
    row.get(&field)
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .ok_or(ReportError::MissingField {
            sample_key: sample_key.to_string(),
            field,
        })
}

/// count the qualifying events of one detail column; absent or empty is zero
fn qualifying(
    row: &Fields,
    field: String,
    allowed: &[Orientation],
    offset: i64,
    boundary: i64,
) -> Result<usize, ReportError> {
    let Some(detail) = row.get(&field).and_then(Value::as_str) else {
        return Ok(0);
    };

    let intervals = parse_alignment_pairs(detail)?;
    let allowed: HashSet<Orientation> = allowed.iter().copied().collect();

    Ok(count_qualifying(&intervals, &allowed, offset, boundary, true))
}

pub fn compute_metrics(
    sample_key: &str,
    row: &Fields,
    rule: &LocusRule,
) -> Result<MetricRow, ReportError> {
    let locus = rule.locus;
    let detail = |kind: &str| locus.key(&format!("{kind}-DETAILS"));
    let count = |kind: &str| locus.key(&format!("{kind}-TOTAL"));

    let sr_count = qualifying(row, detail(SR), rule.sr, 0, rule.boundary)? as f64;
    let sp_count = qualifying(row, detail(SP), rule.sp, rule.sp_offset, rule.boundary)? as f64;

    let sr_total = total(row, sample_key, count(SR))?;
    let sp_total = total(row, sample_key, count(SP))?;

    debug!(
        "{}: SR {}/{} SP {}/{}",
        sample_key, sr_count, sr_total, sp_count, sp_total
    );

    let [sr_col, sp_col, ppm_col] = rule.columns();
    Ok(MetricRow {
        sample_key: sample_key.to_string(),
        sr_ppm: ppm(sr_count, sr_total, sample_key, &sr_col)?,
        sp_ppm: ppm(sp_count, sp_total, sample_key, &sp_col)?,
        ppm: ppm(
            sr_count + SP_WEIGHT * sp_count,
            sr_total + SP_WEIGHT * sp_total,
            sample_key,
            &ppm_col,
        )?,
    })
}

/// compute the metrics of every row on at most `threads` workers,
/// sorted by sample key
pub fn filter_locus(
    table: &AggregatedTable,
    rule: &LocusRule,
    threads: usize,
) -> Result<Vec<MetricRow>, ReportError> {
    let rows: Vec<(&String, &Fields)> = table.rows().collect();
    if rows.is_empty() {
        return Err(ReportError::EmptyResult);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.clamp(1, rows.len()))
        .build()?;

    let mut metrics = pool.install(|| {
        rows.par_iter()
            .map(|(key, row)| compute_metrics(key, row, rule))
            .collect::<Result<Vec<_>, _>>()
    })?;

    metrics.sort_by(|a, b| a.sample_key.cmp(&b.sample_key));
    Ok(metrics)
}

pub fn render_metrics(metrics: &[MetricRow], rule: &LocusRule, delimiter: char) -> String {
    let sep = delimiter.to_string();
    let [sr_col, sp_col, ppm_col] = rule.columns();

    let mut out = [config::SAMPLE_KEY.to_string(), sr_col, sp_col, ppm_col].join(&sep);
    out.push('\n');

    for m in metrics {
        out.push_str(&format!(
            "{}{sep}{:?}{sep}{:?}{sep}{:?}\n",
            m.sample_key, m.sr_ppm, m.sp_ppm, m.ppm
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orientations(list: &[&str]) -> HashSet<Orientation> {
        list.iter().map(|o| o.parse().unwrap()).collect()
    }

    fn iv(left: i64, right: i64, o: &str) -> Interval {
        Interval::new(left, right, o.parse().unwrap())
    }

    /// `n` split reads that pass the TRA SR rule
    fn sr_events(n: usize) -> String {
        "14:900,000-900,010(+)|14:100-110(+);".repeat(n)
    }

    fn row(pairs: &[(&str, Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_sr_rule_requires_descending_midpoints() {
        let allowed = orientations(&["++"]);
        let intervals = vec![
            iv(900_000, 100, "++"),
            // INFO: passes the distance test but ascends
            iv(100, 900_000, "++"),
            iv(900_000, 900_000, "++"),
            iv(900_000, 100, "+-"),
            iv(700_000, 100, "++"),
        ];

        assert_eq!(
            count_qualifying(&intervals, &allowed, 0, SLICING_BOUNDARY, true),
            1
        );
        assert_eq!(
            count_qualifying(&intervals, &allowed, 0, SLICING_BOUNDARY, false),
            3
        );
    }

    #[test]
    fn test_sp_rule_uses_offset_without_direction() {
        let allowed = orientations(&["-+"]);
        let intervals = vec![
            iv(100, TRA_START + 800_001, "-+"),
            iv(TRA_START + 800_001, 100, "-+"),
            iv(TRA_START + 800_000, TRA_START, "-+"),
            iv(TRA_START + 900_000, 100, "++"),
        ];

        assert_eq!(
            count_qualifying(&intervals, &allowed, TRA_START, SLICING_BOUNDARY, true),
            2
        );
    }

    #[test]
    fn test_extreme_midpoints_do_not_overflow() {
        let allowed = orientations(&["-+", "++"]);
        let intervals = vec![
            iv(i64::MIN, i64::MIN, "-+"),
            iv(i64::MAX, i64::MIN, "-+"),
            iv(i64::MAX, 0, "++"),
        ];

        assert_eq!(
            count_qualifying(&intervals, &allowed, TRA_START, SLICING_BOUNDARY, true),
            2
        );
        assert_eq!(
            count_qualifying(&intervals, &allowed, -TRA_START, SLICING_BOUNDARY, true),
            2
        );
        assert!(reaches(i64::MAX, -1, SLICING_BOUNDARY));
        assert!(!reaches(i64::MIN, 1, SLICING_BOUNDARY));
    }

    #[test]
    fn test_sr_ppm_and_zero_sp_total() {
        let sample = row(&[
            ("TRA.SR-DETAILS", json!(sr_events(10))),
            ("TRA.SR-TOTAL", json!(1_000_000)),
            ("TRA.SP-DETAILS", json!("")),
            ("TRA.SP-TOTAL", json!(0)),
        ]);

        let err = compute_metrics("s1", &sample, &LocusRule::TRA).unwrap_err();
        match err {
            ReportError::DivisionByZero { sample_key, metric } => {
                assert_eq!(sample_key, "s1");
                assert_eq!(metric, "TRA.SP-PPM");
            }
            other => panic!("unexpected error {:?}", other),
        }

        let mut sample = sample;
        sample.insert("TRA.SP-TOTAL".into(), json!(500_000));
        let metrics = compute_metrics("s1", &sample, &LocusRule::TRA).unwrap();

        assert_eq!(metrics.sr_ppm, 10.0);
        assert_eq!(metrics.sp_ppm, 0.0);
        assert_eq!(metrics.ppm, 10.0 * 1e6 / 2_000_000.0);
        assert!(metrics.ppm.is_finite());
    }

    #[test]
    fn test_combined_ppm_weights_pairs_twice() {
        let sp = format!(
            "14:1-1(-)|14:{}-{}(+);",
            TRA_START + 900_000,
            TRA_START + 900_000
        );
        let sample = row(&[
            ("TRA.SR-DETAILS", json!(sr_events(1))),
            ("TRA.SR-TOTAL", json!(100)),
            ("TRA.SP-DETAILS", json!(sp.repeat(3))),
            ("TRA.SP-TOTAL", json!("50")),
        ]);

        let m = compute_metrics("s2", &sample, &LocusRule::TRA).unwrap();
        assert_eq!(m.sr_ppm, 1e6 / 100.0);
        assert_eq!(m.sp_ppm, 3.0 * 1e6 / 50.0);
        assert_eq!(m.ppm, 7.0 * 1e6 / 200.0);
    }

    #[test]
    fn test_missing_details_count_zero_but_totals_are_required() {
        let sample = row(&[("TRA.SR-TOTAL", json!(10)), ("TRA.SP-TOTAL", json!(10))]);
        let m = compute_metrics("s3", &sample, &LocusRule::TRA).unwrap();
        assert_eq!((m.sr_ppm, m.sp_ppm, m.ppm), (0.0, 0.0, 0.0));

        let sample = row(&[("TRA.SR-TOTAL", json!(10))]);
        assert!(matches!(
            compute_metrics("s3", &sample, &LocusRule::TRA),
            Err(ReportError::MissingField { .. })
        ));
    }

    #[test]
    fn test_malformed_detail_is_a_parse_error() {
        let sample = row(&[
            ("TRA.SR-DETAILS", json!("14:1-2(+)|garbage;")),
            ("TRA.SR-TOTAL", json!(10)),
            ("TRA.SP-TOTAL", json!(10)),
        ]);

        assert!(matches!(
            compute_metrics("s4", &sample, &LocusRule::TRA),
            Err(ReportError::Parse { .. })
        ));
    }

    #[test]
    fn test_only_tra_has_a_rule() {
        assert_eq!(LocusRule::for_locus(Locus::Tra).unwrap(), LocusRule::TRA);
        assert!(matches!(
            LocusRule::for_locus(Locus::Igh),
            Err(ReportError::MissingRule(Locus::Igh))
        ));
    }

    #[test]
    fn test_filter_and_render_sorted_by_sample() {
        let mut table = AggregatedTable::default();
        for (key, n) in [("b", 2), ("a", 1), ("c", 0)] {
            table.insert(
                key.to_string(),
                row(&[
                    ("TRA.SR-DETAILS", json!(sr_events(n))),
                    ("TRA.SR-TOTAL", json!(1_000_000)),
                    ("TRA.SP-TOTAL", json!(1_000_000)),
                ]),
            );
        }

        let metrics = filter_locus(&table, &LocusRule::TRA, 3).unwrap();
        let text = render_metrics(&metrics, &LocusRule::TRA, '\t');

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "SampleKey\tTRA.SR-PPM\tTRA.SP-PPM\tTRA.PPM");
        assert!(lines[1].starts_with("a\t1.0\t0.0\t"));
        assert!(lines[2].starts_with("b\t2.0\t0.0\t"));
        assert_eq!(lines[3], "c\t0.0\t0.0\t0.0");
    }
}
