//! Bundle 指标收集模块
//!
//! 基于 SyncBundle 收集和统计同步质量指标。

use std::collections::BTreeMap;

use contracts::{CameraId, SyncBundle};
use metrics::{counter, gauge, histogram};

/// Capture-time spread of a bundle in milliseconds (newest minus oldest frame)
pub fn time_spread_ms(bundle: &SyncBundle) -> Option<f64> {
    let mut stamps = bundle.present().map(|r| r.capture_timestamp);
    let first = stamps.next()?;
    let (min, max) = stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    Some((max - min) * 1000.0)
}

/// 从 SyncBundle 记录派生指标
///
/// 同步器自身已记录 bundle 计数与完整度；这里补充时间差相关的分布。
pub fn record_bundle_metrics(bundle: &SyncBundle) {
    gauge!("rigsync_bundle_present").set(bundle.present_count() as f64);

    if let Some(spread) = time_spread_ms(bundle) {
        histogram!("rigsync_bundle_time_spread_ms").record(spread);
    }

    // 各相机帧时间相对周期时间的偏移
    for record in bundle.present() {
        histogram!(
            "rigsync_frame_offset_ms",
            "port" => record.port.to_string()
        )
        .record((bundle.cycle_time - record.capture_timestamp) * 1000.0);
    }

    if !bundle.is_complete() {
        counter!("rigsync_incomplete_bundles_total").increment(1);
    }
}

/// 记录 sink 处理结果
pub fn record_bundle_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "rigsync_bundles_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 单个相机的聚合统计
#[derive(Debug, Clone, Default)]
pub struct PortStats {
    /// 出现帧的 bundle 数
    pub present: u64,
    /// 缺帧的 bundle 数
    pub absent: u64,
    /// 帧时间相对周期时间的偏移 (毫秒)
    pub offset_ms: RunningStats,
}

/// Bundle 指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct BundleMetricsAggregator {
    /// 总 bundle 数
    pub total_bundles: u64,

    /// 所有相机都有帧的 bundle 数
    pub complete_bundles: u64,

    /// sync_index 不连续次数 (订阅者视角，应为 0)
    pub index_gaps: u64,

    /// 时间差统计
    pub spread_stats: RunningStats,

    /// 各相机统计
    pub ports: BTreeMap<CameraId, PortStats>,

    last_index: Option<u64>,
}

impl BundleMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, bundle: &SyncBundle) {
        self.total_bundles += 1;
        if bundle.is_complete() {
            self.complete_bundles += 1;
        }
        if let Some(last) = self.last_index {
            if bundle.sync_index != last + 1 {
                self.index_gaps += 1;
            }
        }
        self.last_index = Some(bundle.sync_index);

        if let Some(spread) = time_spread_ms(bundle) {
            self.spread_stats.push(spread);
        }

        for (port, entry) in &bundle.entries {
            let stats = self.ports.entry(*port).or_default();
            match entry {
                Some(record) => {
                    stats.present += 1;
                    stats
                        .offset_ms
                        .push((bundle.cycle_time - record.capture_timestamp) * 1000.0);
                }
                None => stats.absent += 1,
            }
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_bundles: self.total_bundles,
            complete_bundles: self.complete_bundles,
            complete_rate: if self.total_bundles > 0 {
                self.complete_bundles as f64 / self.total_bundles as f64 * 100.0
            } else {
                0.0
            },
            index_gaps: self.index_gaps,
            time_spread_ms: StatsSummary::from(&self.spread_stats),
            ports: self
                .ports
                .iter()
                .map(|(port, stats)| {
                    (
                        *port,
                        PortSummary {
                            present: stats.present,
                            absent: stats.absent,
                            offset_ms: StatsSummary::from(&stats.offset_ms),
                        },
                    )
                })
                .collect(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 单相机摘要
#[derive(Debug, Clone, Default)]
pub struct PortSummary {
    pub present: u64,
    pub absent: u64,
    pub offset_ms: StatsSummary,
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_bundles: u64,
    pub complete_bundles: u64,
    pub complete_rate: f64,
    pub index_gaps: u64,
    pub time_spread_ms: StatsSummary,
    pub ports: BTreeMap<CameraId, PortSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Bundle Metrics Summary ===")?;
        writeln!(f, "Total bundles: {}", self.total_bundles)?;
        writeln!(
            f,
            "Complete bundles: {} ({:.2}%)",
            self.complete_bundles, self.complete_rate
        )?;
        writeln!(f, "Index gaps: {}", self.index_gaps)?;
        writeln!(f, "Time spread (ms): {}", self.time_spread_ms)?;

        for (port, summary) in &self.ports {
            writeln!(
                f,
                "  port {}: present={}, absent={}, offset(ms) {}",
                port, summary.present, summary.absent, summary.offset_ms
            )?;
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
