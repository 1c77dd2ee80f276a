//! Owned façade over a provider, a configuration, and a compute pool.

use std::sync::Arc;

use crime_intel_analytics_models::{
    AnalysisFilter, BehaviorParams, BehaviorResult, ClusterParams, ClusterResult,
    CorrelationParams, DistrictCount, HeatmapParams, HeatmapResult, MonthlyTrend, PatternParams,
    PatternReport, RelatedCasesResult, RepeatOffender, RepeatOffenderParams, RiskParams,
    RiskScore, SearchParams, SearchResponse, TagFrequency,
};
use crime_intel_database::DataProvider;
use crime_intel_spatial::CancelToken;

use crate::patterns::AnalysisSnapshot;
use crate::{
    AnalysisContext, AnalyticsError, EngineConfig, behavior, cluster, correlation, heatmap,
    patterns, risk, search, stats,
};

/// Shareable analytics engine.
///
/// Holds no per-request state; every method can run concurrently from
/// many threads.
pub struct Engine {
    provider: Arc<dyn DataProvider>,
    config: EngineConfig,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("threads", &self.pool.current_num_threads())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Validates `config` and builds the compute pool.
    ///
    /// # Errors
    ///
    /// * If the configuration is invalid
    /// * If the pool cannot be built
    pub fn new(provider: Arc<dyn DataProvider>, config: EngineConfig) -> Result<Self, AnalyticsError> {
        config.validate()?;
        let pool = config.build_pool()?;
        log::info!(
            "Analytics engine ready with {} worker threads",
            pool.current_num_threads()
        );
        Ok(Self {
            provider,
            config,
            pool,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Borrowed context for the free-function API.
    #[must_use]
    pub fn ctx(&self) -> AnalysisContext<'_> {
        AnalysisContext::new(self.provider.as_ref(), &self.config, &self.pool)
    }

    /// A token carrying the configured request deadline.
    #[must_use]
    pub fn request_token(&self) -> CancelToken {
        self.config.request_token()
    }

    /// See [`heatmap::generate_heatmap`].
    ///
    /// # Errors
    ///
    /// See [`heatmap::generate_heatmap`].
    pub fn heatmap(
        &self,
        params: &HeatmapParams,
        cancel: &CancelToken,
    ) -> Result<HeatmapResult, AnalyticsError> {
        heatmap::generate_heatmap(&self.ctx(), params, cancel)
    }

    /// See [`cluster::find_clusters`].
    ///
    /// # Errors
    ///
    /// See [`cluster::find_clusters`].
    pub fn clusters(
        &self,
        params: &ClusterParams,
        cancel: &CancelToken,
    ) -> Result<ClusterResult, AnalyticsError> {
        cluster::find_clusters(&self.ctx(), params, cancel)
    }

    /// See [`correlation::find_related_cases`].
    ///
    /// # Errors
    ///
    /// See [`correlation::find_related_cases`].
    pub fn related_cases(
        &self,
        params: &CorrelationParams,
        cancel: &CancelToken,
    ) -> Result<RelatedCasesResult, AnalyticsError> {
        correlation::find_related_cases(&self.ctx(), params, cancel)
    }

    /// See [`behavior::find_similar_behavior`].
    ///
    /// # Errors
    ///
    /// See [`behavior::find_similar_behavior`].
    pub fn similar_behavior(
        &self,
        params: &BehaviorParams,
        cancel: &CancelToken,
    ) -> Result<BehaviorResult, AnalyticsError> {
        behavior::find_similar_behavior(&self.ctx(), params, cancel)
    }

    /// See [`patterns::analyze_patterns`].
    ///
    /// # Errors
    ///
    /// See [`patterns::analyze_patterns`].
    pub fn patterns(
        &self,
        params: &PatternParams,
        cancel: &CancelToken,
    ) -> Result<PatternReport, AnalyticsError> {
        patterns::analyze_patterns(&self.ctx(), params, cancel)
    }

    /// See [`patterns::find_repeat_offenders`].
    ///
    /// # Errors
    ///
    /// See [`patterns::find_repeat_offenders`].
    pub fn repeat_offenders(
        &self,
        params: &RepeatOffenderParams,
        cancel: &CancelToken,
    ) -> Result<Vec<RepeatOffender>, AnalyticsError> {
        patterns::find_repeat_offenders(&self.ctx(), params, cancel)
    }

    /// See [`risk::score_person`].
    ///
    /// # Errors
    ///
    /// See [`risk::score_person`].
    pub fn risk(&self, params: &RiskParams, cancel: &CancelToken) -> Result<RiskScore, AnalyticsError> {
        risk::score_person(&self.ctx(), params, cancel)
    }

    /// See [`search::search`].
    ///
    /// # Errors
    ///
    /// See [`search::search`].
    pub fn search(
        &self,
        params: SearchParams,
        cancel: &CancelToken,
    ) -> Result<SearchResponse, AnalyticsError> {
        search::search(&self.ctx(), params, cancel)
    }

    /// Tag frequencies within `filter`.
    ///
    /// # Errors
    ///
    /// See [`AnalysisSnapshot::collect`].
    pub fn tag_frequency(
        &self,
        filter: &AnalysisFilter,
        cancel: &CancelToken,
    ) -> Result<Vec<TagFrequency>, AnalyticsError> {
        let snapshot = AnalysisSnapshot::collect(&self.ctx(), filter, cancel)?;
        Ok(stats::tag_frequency(&snapshot))
    }

    /// District counts within `filter`.
    ///
    /// # Errors
    ///
    /// See [`AnalysisSnapshot::collect`].
    pub fn districts(
        &self,
        filter: &AnalysisFilter,
        cancel: &CancelToken,
    ) -> Result<Vec<DistrictCount>, AnalyticsError> {
        let snapshot = AnalysisSnapshot::collect(&self.ctx(), filter, cancel)?;
        Ok(stats::incidents_by_district(&snapshot))
    }

    /// Monthly counts for `year` within `filter`.
    ///
    /// # Errors
    ///
    /// See [`AnalysisSnapshot::collect`].
    pub fn monthly_trend(
        &self,
        filter: &AnalysisFilter,
        year: i32,
        cancel: &CancelToken,
    ) -> Result<MonthlyTrend, AnalyticsError> {
        let snapshot = AnalysisSnapshot::collect(&self.ctx(), filter, cancel)?;
        Ok(stats::monthly_trend(&snapshot, year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_intel_database::Snapshot;

    const SNAPSHOT: &str = r#"{
        "tags": [{"id": 1, "name": "burglary"}],
        "incidents": [
            {"id": 10, "incident_type": "burglary", "occurred_at": "2024-03-01T22:00:00Z",
             "latitude": 12.96, "longitude": 77.58, "district": "North", "tag_ids": [1]},
            {"id": 20, "incident_type": "burglary", "occurred_at": "2024-03-03T22:00:00Z",
             "latitude": 12.961, "longitude": 77.581, "district": "North", "tag_ids": [1]}
        ],
        "cases": [
            {"id": 1, "title": "First", "status": "open", "primary_incident_id": 10,
             "created_at": "2024-03-02T00:00:00Z"},
            {"id": 2, "title": "Second", "status": "open", "primary_incident_id": 20,
             "created_at": "2024-03-04T00:00:00Z"}
        ],
        "persons": [{"id": 100, "name": "Pat Doe"}],
        "case_persons": [
            {"case_id": 1, "person_id": 100, "role": "suspect"},
            {"case_id": 2, "person_id": 100, "role": "suspect"}
        ]
    }"#;

    fn engine() -> Engine {
        let snapshot = Snapshot::from_json_str(SNAPSHOT).unwrap();
        let config = EngineConfig {
            parallelism: 2,
            ..EngineConfig::default()
        };
        Engine::new(Arc::new(snapshot), config).unwrap()
    }

    #[test]
    fn runs_every_operation_over_one_snapshot() {
        let engine = engine();
        let cancel = engine.request_token();

        let related = engine
            .related_cases(&CorrelationParams::new(1), &cancel)
            .unwrap();
        assert_eq!(related.results[0].case_id, 2);

        let offenders = engine
            .repeat_offenders(&RepeatOffenderParams::default(), &cancel)
            .unwrap();
        assert_eq!(offenders[0].case_count, 2);
        assert_eq!(offenders[0].pattern_match_count, 1);

        let districts = engine.districts(&AnalysisFilter::default(), &cancel).unwrap();
        assert_eq!(districts[0].count, 2);

        let trend = engine
            .monthly_trend(&AnalysisFilter::default(), 2024, &cancel)
            .unwrap();
        assert_eq!(trend.months[2].count, 2);

        let response = engine.search(SearchParams::default(), &cancel).unwrap();
        assert_eq!(response.total, 2);
    }

    #[test]
    fn rejects_invalid_config() {
        let snapshot = Snapshot::from_json_str(SNAPSHOT).unwrap();
        let config = EngineConfig {
            parallelism: 0,
            ..EngineConfig::default()
        };
        let err = Engine::new(Arc::new(snapshot), config).unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}
