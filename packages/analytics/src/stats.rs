//! Descriptive statistics over an analysis scope.

use std::collections::BTreeMap;

use chrono::{Datelike as _, Month};
use crime_intel_analytics_models::{DistrictCount, MonthlyCount, MonthlyTrend, TagFrequency};

use crate::count_u32;
use crate::patterns::AnalysisSnapshot;

/// Incidents per tag name, by count (desc), then name.
#[must_use]
pub fn tag_frequency(snapshot: &AnalysisSnapshot) -> Vec<TagFrequency> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for incident in &snapshot.incidents {
        for tag in snapshot.tags_of(incident) {
            *counts.entry(tag).or_default() += 1;
        }
    }

    let mut frequencies: Vec<TagFrequency> = counts
        .into_iter()
        .map(|(tag, count)| TagFrequency {
            tag: tag.to_string(),
            count: count_u32(count),
        })
        .collect();
    frequencies.sort_by(|a, b| b.count.cmp(&a.count));
    frequencies
}

/// Incidents per district, by count (desc), then district. Incidents
/// without a district are not counted.
#[must_use]
pub fn incidents_by_district(snapshot: &AnalysisSnapshot) -> Vec<DistrictCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for district in snapshot.incidents.iter().filter_map(|i| i.district.as_deref()) {
        *counts.entry(district).or_default() += 1;
    }

    let mut districts: Vec<DistrictCount> = counts
        .into_iter()
        .map(|(district, count)| DistrictCount {
            district: district.to_string(),
            count: count_u32(count),
        })
        .collect();
    districts.sort_by(|a, b| b.count.cmp(&a.count));
    districts
}

/// Incidents per calendar month of `year` (UTC), all twelve months
/// included.
#[must_use]
pub fn monthly_trend(snapshot: &AnalysisSnapshot, year: i32) -> MonthlyTrend {
    let mut counts = [0_usize; 12];
    for incident in snapshot
        .incidents
        .iter()
        .filter(|i| i.occurred_at.year() == year)
    {
        counts[incident.occurred_at.month0() as usize] += 1;
    }

    let months = (1..=12_u8)
        .zip(counts)
        .map(|(month, count)| MonthlyCount {
            month: u32::from(month),
            name: Month::try_from(month)
                .map(|m| m.name().to_string())
                .unwrap_or_default(),
            count: count_u32(count),
        })
        .collect();

    MonthlyTrend { year, months }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FixtureBuilder, TestEngine, ts};
    use crime_intel_analytics_models::AnalysisFilter;
    use crime_intel_spatial::CancelToken;

    fn scenario() -> TestEngine {
        FixtureBuilder::new()
            .tag(1, "theft")
            .tag(2, "night")
            .tag(3, "arson")
            .incident(1, 40.0, -75.0, ts(2024, 1, 3, 22), &[1, 2])
            .incident(2, 40.0, -75.0, ts(2024, 1, 20, 23), &[1])
            .incident(3, 40.0, -75.0, ts(2024, 6, 1, 12), &[3, 2])
            .incident(4, 40.0, -75.0, ts(2023, 6, 1, 12), &[1])
            .district(1, "Central")
            .district(2, "Harbor")
            .district(3, "Central")
            .build()
    }

    fn snapshot(engine: &TestEngine) -> AnalysisSnapshot {
        AnalysisSnapshot::collect(&engine.ctx(), &AnalysisFilter::default(), &CancelToken::new())
            .unwrap()
    }

    #[test]
    fn tags_by_frequency_then_name() {
        let engine = scenario();
        let frequencies = tag_frequency(&snapshot(&engine));
        let pairs: Vec<(&str, u32)> = frequencies
            .iter()
            .map(|f| (f.tag.as_str(), f.count))
            .collect();
        assert_eq!(pairs, vec![("theft", 3), ("night", 2), ("arson", 1)]);
    }

    #[test]
    fn districts_skip_missing_labels() {
        let engine = scenario();
        let districts = incidents_by_district(&snapshot(&engine));
        let pairs: Vec<(&str, u32)> = districts
            .iter()
            .map(|d| (d.district.as_str(), d.count))
            .collect();
        assert_eq!(pairs, vec![("Central", 2), ("Harbor", 1)]);
    }

    #[test]
    fn monthly_trend_covers_every_month() {
        let engine = scenario();
        let trend = monthly_trend(&snapshot(&engine), 2024);
        assert_eq!(trend.months.len(), 12);
        assert_eq!(trend.months[0].name, "January");
        assert_eq!(trend.months[0].count, 2);
        assert_eq!(trend.months[5].name, "June");
        assert_eq!(trend.months[5].count, 1);
        let total: u32 = trend.months.iter().map(|m| m.count).sum();
        assert_eq!(total, 3);
    }
}
