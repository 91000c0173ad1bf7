use serde::Serialize;
use std::time::{Duration, Instant};

/// 查询各阶段名称
pub struct StageKeys;

impl StageKeys {
    pub const ENRICH_INPUT: &'static str = "EnrichInput";
    pub const BUILD_FILTERS: &'static str = "BuildFilters";
    pub const RUN_MULTI_QUERY: &'static str = "RunMultiQuery";
    pub const SUMMARIZE: &'static str = "Summarize";
    pub const REFERENCES: &'static str = "References";
}

/// 单次查询的阶段耗时
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryTimings {
    /// 按执行顺序记录的 (阶段, 耗时)
    pub stages: Vec<(String, Duration)>,
    pub total: Duration,
}

impl QueryTimings {
    pub fn stage(&self, name: &str) -> Option<Duration> {
        self.stages
            .iter()
            .find(|(stage, _)| stage == name)
            .map(|(_, d)| *d)
    }

    /// 格式化的执行时间报告
    pub fn report(&self) -> String {
        let stages: Vec<String> = self
            .stages
            .iter()
            .map(|(stage, d)| format!("{}={:.3}s", stage, d.as_secs_f64()))
            .collect();
        format!("total={:.3}s | {}", self.total.as_secs_f64(), stages.join(", "))
    }
}

/// 时间跟踪作用域
pub struct TimingScope {
    start_time: Instant,
    phase_start: Option<(&'static str, Instant)>,
    timings: QueryTimings,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_start: None,
            timings: QueryTimings::default(),
        }
    }

    /// 开始一个新的阶段计时，未结束的上一阶段随之结束
    pub fn start_phase(&mut self, phase_name: &'static str) {
        self.end_phase();
        self.phase_start = Some((phase_name, Instant::now()));
    }

    /// 结束当前阶段的计时
    pub fn end_phase(&mut self) -> Option<Duration> {
        let (name, start) = self.phase_start.take()?;
        let duration = start.elapsed();
        self.timings.stages.push((name.to_string(), duration));
        Some(duration)
    }

    pub fn finish(mut self) -> QueryTimings {
        self.end_phase();
        self.timings.total = self.start_time.elapsed();
        self.timings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_scope_records_phases_in_order() {
        let mut scope = TimingScope::new();
        scope.start_phase(StageKeys::ENRICH_INPUT);
        scope.start_phase(StageKeys::BUILD_FILTERS);
        assert!(scope.end_phase().is_some());
        assert!(scope.end_phase().is_none());
        scope.start_phase(StageKeys::SUMMARIZE);
        let timings = scope.finish();

        let names: Vec<&str> = timings.stages.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["EnrichInput", "BuildFilters", "Summarize"]);
        assert!(timings.stage(StageKeys::RUN_MULTI_QUERY).is_none());
        assert!(timings.total >= timings.stage(StageKeys::ENRICH_INPUT).unwrap());
        assert!(timings.report().starts_with("total="));
    }
}
