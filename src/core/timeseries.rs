use crate::models::YearValue;
use std::collections::BTreeMap;

/// Smallest and largest year present, or `None` for an empty input.
pub fn year_bounds<I>(years: I) -> Option<(i32, i32)>
where
    I: IntoIterator<Item = i32>,
{
    years.into_iter().fold(None, |acc, year| match acc {
        None => Some((year, year)),
        Some((lo, hi)) => Some((lo.min(year), hi.max(year))),
    })
}

/// Keeps points whose year lies inside the inclusive, optionally open-ended range.
pub fn filter_years(points: Vec<YearValue>, from: Option<i32>, to: Option<i32>) -> Vec<YearValue> {
    points
        .into_iter()
        .filter(|p| from.map_or(true, |f| p.year >= f) && to.map_or(true, |t| p.year <= t))
        .collect()
}

/// Mean value per year across every series, ordered by year.
/// Running means, so large finite values do not overflow.
pub fn year_means<I>(points: I) -> BTreeMap<i32, f64>
where
    I: IntoIterator<Item = (i32, f64)>,
{
    let mut buckets: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for (year, value) in points {
        let (mean, count) = buckets.entry(year).or_insert((0.0, 0));
        *count += 1;
        *mean += (value - *mean) / *count as f64;
    }

    buckets
        .into_iter()
        .map(|(year, (mean, _))| (year, mean))
        .collect()
}

/// Ordinary least-squares slope of `y` over `x`.
/// Needs at least two points with distinct `x`, otherwise `None`.
pub fn least_squares_slope(points: &[(f64, f64)]) -> Option<f64> {
    let n = points.len();
    if n < 2 {
        return None;
    }

    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n as f64;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n as f64;

    // Centered sums keep precision with year-sized x values
    let mut numer = 0.0;
    let mut denom = 0.0;
    for (x, y) in points {
        let dx = x - mean_x;
        numer += dx * (y - mean_y);
        denom += dx * dx;
    }

    if denom == 0.0 {
        return None;
    }

    Some(numer / denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_bounds() {
        assert_eq!(year_bounds(vec![2003, 1999, 2010]), Some((1999, 2010)));
        assert_eq!(year_bounds(Vec::new()), None);
    }

    #[test]
    fn test_filter_years_open_ended() {
        let points: Vec<YearValue> = (2000..2005).map(|y| YearValue { year: y, value: 1.0 }).collect();

        assert_eq!(filter_years(points.clone(), Some(2003), None).len(), 2);
        assert_eq!(filter_years(points.clone(), None, Some(2000)).len(), 1);
        assert_eq!(filter_years(points, None, None).len(), 5);
    }

    #[test]
    fn test_year_means_pool_series() {
        let means = year_means(vec![(2020, 10.0), (2021, 5.0), (2020, 30.0)]);
        assert_eq!(means.get(&2020), Some(&20.0));
        assert_eq!(means.get(&2021), Some(&5.0));
        assert_eq!(means.keys().copied().collect::<Vec<_>>(), vec![2020, 2021]);

        let huge = year_means(vec![(2020, 1e308), (2020, 1e308)]);
        assert_eq!(huge.get(&2020), Some(&1e308));
    }

    #[test]
    fn test_least_squares_slope() {
        let slope = least_squares_slope(&[(2020.0, 10.0), (2021.0, 20.0), (2022.0, 30.0)]).unwrap();
        assert!((slope - 10.0).abs() < 1e-9);

        assert_eq!(least_squares_slope(&[(2020.0, 1.0)]), None);
        assert_eq!(least_squares_slope(&[(2020.0, 1.0), (2020.0, 2.0)]), None);
    }
}
