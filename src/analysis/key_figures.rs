//! Key figures for the metric explorer: pooled average, extremes, first/last
//! year change and a linear trend over an inclusive year window.
//!
//! Every derived figure is an `Option`; `None` (JSON `null`) means there was
//! not enough data, which callers must keep distinct from a computed zero.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::core::timeseries::{least_squares_slope, year_bounds, year_means};
use crate::models::YearValue;

/// Slopes within `±TREND_EPSILON` per year count as stable. The threshold is
/// absolute, so it does not scale with the metric's magnitude.
pub const TREND_EPSILON: f64 = 0.01;

/// A number as it arrives from clients: JSON number or numeric string.
/// Anything else lands in `Other` and never parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
    Other(Value),
}

impl Numeric {
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Numeric::Number(v) => *v,
            Numeric::Text(s) => s.trim().parse::<f64>().ok()?,
            Numeric::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    pub fn as_year(&self) -> Option<i32> {
        match self {
            Numeric::Text(s) if s.trim().parse::<i32>().is_ok() => s.trim().parse().ok(),
            _ => {
                let v = self.as_f64()?;
                (v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64).then_some(v as i32)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    #[serde(default)]
    pub year: Option<Numeric>,
    #[serde(default)]
    pub value: Option<Numeric>,
}

impl SeriesPoint {
    pub fn new(year: i32, value: f64) -> Self {
        Self {
            year: Some(Numeric::Number(year as f64)),
            value: Some(Numeric::Number(value)),
        }
    }
}

/// One country's raw points for the selected metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountrySeries {
    #[serde(default, deserialize_with = "lenient_label")]
    pub country: String,
    #[serde(default)]
    pub points: Vec<SeriesPoint>,
}

/// Strings pass through, `null` becomes empty, other scalars keep their JSON text.
fn lenient_label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl CountrySeries {
    pub fn from_points(country: impl Into<String>, points: &[YearValue]) -> Self {
        Self {
            country: country.into(),
            points: points.iter().map(|p| SeriesPoint::new(p.year, p.value)).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFiguresRequest {
    #[serde(default)]
    pub series: Vec<CountrySeries>,
    pub from_year: Option<i32>,
    pub to_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extreme {
    pub value: f64,
    pub country: String,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub value: f64,
    /// Relative to `|mean(fromYear)|`; `None` when that mean is zero.
    pub percentage: Option<f64>,
    pub from_year: i32,
    pub to_year: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Upward,
    Downward,
    Stable,
}

impl TrendDirection {
    pub fn classify(slope: f64) -> Self {
        if slope > TREND_EPSILON {
            TrendDirection::Upward
        } else if slope < -TREND_EPSILON {
            TrendDirection::Downward
        } else {
            TrendDirection::Stable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub slope: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub from_year: i32,
    pub to_year: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyFigures {
    pub average: Option<f64>,
    pub minimum: Option<Extreme>,
    pub maximum: Option<Extreme>,
    pub change: Option<Change>,
    pub trend: Option<Trend>,
    pub period: Option<Period>,
}

struct PooledPoint<'a> {
    country: &'a str,
    year: i32,
    value: f64,
}

/// Computes the key figures of `series` restricted to `[from_year, to_year]`.
/// A missing bound defaults to the earliest/latest year present in the data.
pub fn calculate_key_figures(
    series: &[CountrySeries],
    from_year: Option<i32>,
    to_year: Option<i32>,
) -> KeyFigures {
    // 1. Parse everything that is numeric, drop the rest silently
    let parsed: Vec<PooledPoint<'_>> = series
        .iter()
        .flat_map(|s| {
            s.points.iter().filter_map(move |p| {
                Some(PooledPoint {
                    country: s.country.as_str(),
                    year: p.year.as_ref()?.as_year()?,
                    value: p.value.as_ref()?.as_f64()?,
                })
            })
        })
        .collect();

    // 2. Resolve the window
    let available = year_bounds(parsed.iter().map(|p| p.year));
    let from = from_year.or(available.map(|(lo, _)| lo));
    let to = to_year.or(available.map(|(_, hi)| hi));
    let (Some(from), Some(to)) = (from, to) else {
        return KeyFigures::default();
    };
    let period = Some(Period { from_year: from, to_year: to });

    let points: Vec<&PooledPoint<'_>> = parsed
        .iter()
        .filter(|p| p.year >= from && p.year <= to)
        .collect();

    if points.is_empty() {
        return KeyFigures { period, ..KeyFigures::default() };
    }

    // 3. Pooled statistics (flat across countries)
    // Running mean: a plain sum can overflow even when every value is finite
    let average = points
        .iter()
        .enumerate()
        .fold(0.0, |mean, (i, p)| mean + (p.value - mean) / (i + 1) as f64);
    let average = if average.is_finite() {
        Some(average)
    } else {
        warn!("Pooled average of {} points is not finite", points.len());
        None
    };

    let mut min = points[0];
    let mut max = points[0];
    for p in &points[1..] {
        // Strict comparisons: the first point seen wins ties
        if p.value < min.value {
            min = p;
        }
        if p.value > max.value {
            max = p;
        }
    }

    // 4. Per-year means drive both change and trend
    let means = year_means(points.iter().map(|p| (p.year, p.value)));

    let change = match (means.get(&from), means.get(&to)) {
        (Some(&first), Some(&last)) => {
            let delta = last - first;
            Some(Change {
                value: delta,
                percentage: (first != 0.0).then(|| delta / first.abs() * 100.0),
                from_year: from,
                to_year: to,
            })
        }
        _ => None,
    };

    let regression_input: Vec<(f64, f64)> = means
        .iter()
        .map(|(&year, &mean)| (year as f64, mean))
        .collect();
    let trend = least_squares_slope(&regression_input).map(|slope| Trend {
        slope,
        direction: TrendDirection::classify(slope),
    });

    KeyFigures {
        average,
        minimum: Some(Extreme { value: min.value, country: min.country.to_string(), year: min.year }),
        maximum: Some(Extreme { value: max.value, country: max.country.to_string(), year: max.year }),
        change,
        trend,
        period,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(country: &str, points: &[(i32, f64)]) -> CountrySeries {
        CountrySeries {
            country: country.to_string(),
            points: points.iter().map(|&(y, v)| SeriesPoint::new(y, v)).collect(),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn test_no_points_yields_sentinels() {
        let figures = calculate_key_figures(&[], None, None);
        assert_eq!(figures, KeyFigures::default());

        let figures = calculate_key_figures(&[series("India", &[(2010, 5.0)])], Some(2020), Some(2022));
        assert_eq!(figures.average, None);
        assert_eq!(figures.minimum, None);
        assert_eq!(figures.maximum, None);
        assert_eq!(figures.change, None);
        assert_eq!(figures.trend, None);
        assert_eq!(figures.period, Some(Period { from_year: 2020, to_year: 2022 }));
    }

    #[test]
    fn test_single_series_reference_case() {
        let data = [series("India", &[(2020, 10.0), (2021, 20.0), (2022, 30.0)])];
        let figures = calculate_key_figures(&data, Some(2020), Some(2022));

        assert_close(figures.average.unwrap(), 20.0);
        assert_eq!(figures.minimum.unwrap(), Extreme { value: 10.0, country: "India".into(), year: 2020 });
        assert_eq!(figures.maximum.unwrap(), Extreme { value: 30.0, country: "India".into(), year: 2022 });

        let change = figures.change.unwrap();
        assert_close(change.value, 20.0);
        assert_close(change.percentage.unwrap(), 200.0);
        assert_eq!((change.from_year, change.to_year), (2020, 2022));

        let trend = figures.trend.unwrap();
        assert_close(trend.slope, 10.0);
        assert_eq!(trend.direction, TrendDirection::Upward);
    }

    #[test]
    fn test_average_pools_countries() {
        let data = [series("A", &[(2020, 10.0)]), series("B", &[(2020, 30.0), (2021, 50.0)])];
        let figures = calculate_key_figures(&data, Some(2020), Some(2020));

        assert_close(figures.average.unwrap(), 20.0);
        // one year only: no trend, change compares the year with itself
        assert_eq!(figures.trend, None);
        assert_close(figures.change.unwrap().value, 0.0);

        // pooled over all three points, not a mean of per-country means (25.0)
        let all = calculate_key_figures(&data, None, None);
        assert_close(all.average.unwrap(), 30.0);
    }

    #[test]
    fn test_default_range_spans_available_years() {
        let data = [series("A", &[(2015, 1.0), (2018, 2.0)]), series("B", &[(2012, 3.0)])];
        let figures = calculate_key_figures(&data, None, None);
        assert_eq!(figures.period, Some(Period { from_year: 2012, to_year: 2018 }));

        let open_start = calculate_key_figures(&data, None, Some(2015));
        assert_eq!(open_start.period, Some(Period { from_year: 2012, to_year: 2015 }));
    }

    #[test]
    fn test_ties_keep_first_point() {
        let data = [series("A", &[(2020, 5.0)]), series("B", &[(2021, 5.0)])];
        let figures = calculate_key_figures(&data, None, None);

        assert_eq!(figures.minimum.unwrap().country, "A");
        assert_eq!(figures.maximum.unwrap().country, "A");
    }

    #[test]
    fn test_change_needs_both_boundary_years() {
        let data = [series("A", &[(2020, 5.0), (2021, 6.0)])];
        let figures = calculate_key_figures(&data, Some(2019), Some(2021));
        assert_eq!(figures.change, None);
        assert!(figures.trend.is_some());
    }

    #[test]
    fn test_zero_base_has_no_percentage() {
        let data = [series("A", &[(2020, 0.0), (2021, 4.0)])];
        let change = calculate_key_figures(&data, None, None).change.unwrap();
        assert_close(change.value, 4.0);
        assert_eq!(change.percentage, None);
    }

    #[test]
    fn test_negative_base_uses_magnitude() {
        let data = [series("A", &[(2020, -10.0), (2021, -5.0)])];
        let change = calculate_key_figures(&data, None, None).change.unwrap();
        assert_close(change.percentage.unwrap(), 50.0);
    }

    #[test]
    fn test_trend_direction_thresholds() {
        assert_eq!(TrendDirection::classify(0.011), TrendDirection::Upward);
        assert_eq!(TrendDirection::classify(0.01), TrendDirection::Stable);
        assert_eq!(TrendDirection::classify(-0.005), TrendDirection::Stable);
        assert_eq!(TrendDirection::classify(-0.02), TrendDirection::Downward);

        let falling = [series("A", &[(2000, 9.0), (2001, 6.0), (2002, 3.0)])];
        let trend = calculate_key_figures(&falling, None, None).trend.unwrap();
        assert_eq!(trend.direction, TrendDirection::Downward);
    }

    #[test]
    fn test_trend_uses_per_year_means() {
        // 2020 mean = 20 (10 and 30), 2021 mean = 20: flat despite spread
        let data = [series("A", &[(2020, 10.0), (2021, 20.0)]), series("B", &[(2020, 30.0)])];
        let trend = calculate_key_figures(&data, None, None).trend.unwrap();
        assert_close(trend.slope, 0.0);
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_unparseable_points_are_ignored() {
        let request: KeyFiguresRequest = serde_json::from_value(json!({
            "series": [{
                "country": "India",
                "points": [
                    { "year": "2020", "value": 10 },
                    { "year": "2021", "value": null },
                    { "year": 2021, "value": "n/a" },
                    { "year": "soon", "value": 4 },
                    { "year": 2022, "value": "30" }
                ]
            }]
        }))
        .unwrap();

        let figures = calculate_key_figures(&request.series, request.from_year, request.to_year);
        assert_close(figures.average.unwrap(), 20.0);
        assert_eq!(figures.period, Some(Period { from_year: 2020, to_year: 2022 }));
    }

    #[test]
    fn test_non_numeric_json_values_drop_only_their_point() {
        let request: KeyFiguresRequest = serde_json::from_value(json!({
            "series": [
                {
                    "country": "India",
                    "points": [
                        { "year": 2020, "value": 10 },
                        { "year": 2021, "value": true },
                        { "year": 2021, "value": { "amount": 5 } },
                        { "year": [2021], "value": 7 },
                        { "year": 2022, "value": 30 }
                    ]
                },
                { "country": null, "points": [{ "year": 2022, "value": 50 }] }
            ]
        }))
        .unwrap();

        assert_eq!(request.series[1].country, "");
        let figures = calculate_key_figures(&request.series, None, None);
        assert_close(figures.average.unwrap(), 30.0);
        assert_eq!(figures.maximum.unwrap().value, 50.0);
        assert_eq!(figures.period, Some(Period { from_year: 2020, to_year: 2022 }));
    }

    #[test]
    fn test_average_of_huge_values_stays_finite() {
        let data = [series("A", &[(2020, 1e308), (2021, 1e308)])];
        let figures = calculate_key_figures(&data, None, None);

        assert_eq!(figures.average, Some(1e308));
        let json = serde_json::to_value(&figures).unwrap();
        assert_eq!(json["average"], 1e308);
    }

    #[test]
    fn test_recomputation_is_deterministic() {
        let data = [series("A", &[(2001, 3.5), (2003, 1.25)]), series("B", &[(2002, 8.0)])];
        let first = calculate_key_figures(&data, None, None);
        let second = calculate_key_figures(&data, None, None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_serializes_sentinels_as_null() {
        let json = serde_json::to_value(calculate_key_figures(&[], Some(2000), Some(2001))).unwrap();
        assert!(json["average"].is_null());
        assert!(json["trend"].is_null());
        assert_eq!(json["period"]["fromYear"], 2000);
    }
}
