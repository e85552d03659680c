use std::collections::BTreeMap;
use std::time::Instant;

/// Observability seam for pipeline runs.
///
/// The executor reports what happened; implementations decide where it
/// goes (the `log` crate, a test capture, nowhere). Orchestration code
/// never formats output itself.
pub trait PipelineLogger: Send {
    /// Frame-level progress: `current` of `total` frames done.
    fn progress(&mut self, current: usize, total: usize);

    /// Duration of one named stage for one frame, in milliseconds.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// A per-frame observation, e.g. how many people were detected.
    fn metric(&mut self, name: &str, value: f64);

    /// Free-form status message.
    fn info(&mut self, message: &str);

    /// End-of-run report. Default: no-op.
    fn summary(&self) {}
}

/// Logger that drops everything. The default when the caller has its own
/// progress channel, and the usual choice in tests.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate over one stream of samples. Stores no history, so a
/// long video costs constant memory per stage.
#[derive(Debug, Default, Clone, Copy)]
struct Aggregate {
    count: usize,
    sum: f64,
    peak: f64,
}

impl Aggregate {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        if value > self.peak {
            self.peak = value;
        }
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Logger for CLI runs: routes everything through `log::info!`, keeps
/// per-stage timing aggregates, and prints a closing report.
///
/// Progress lines are throttled to one per `every` frames so a long video
/// does not flood the terminal.
pub struct StdoutPipelineLogger {
    every: usize,
    stages: BTreeMap<String, Aggregate>,
    metrics: BTreeMap<String, Aggregate>,
    started: Instant,
    frames_seen: usize,
}

impl StdoutPipelineLogger {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            frames_seen: 0,
        }
    }

    /// The closing report, or `None` when nothing was recorded.
    pub fn report(&self) -> Option<String> {
        if self.stages.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut out = format!(
            "Processed {} frames in {elapsed:.1}s",
            self.frames_seen
        );
        if self.frames_seen > 0 && elapsed > 0.0 {
            out.push_str(&format!(" ({:.1} fps)", self.frames_seen as f64 / elapsed));
        }

        for (stage, agg) in &self.stages {
            out.push_str(&format!(
                "\n  {stage}: {:.1}ms/frame avg, {:.1}ms peak, {:.0}ms total",
                agg.mean(),
                agg.peak,
                agg.sum,
            ));
        }
        for (name, agg) in &self.metrics {
            out.push_str(&format!("\n  {name}: {:.1} avg", agg.mean()));
        }

        Some(out)
    }

    /// Mean recorded duration for `stage`, for tests and callers that
    /// post-process a run.
    pub fn mean_timing(&self, stage: &str) -> Option<f64> {
        self.stages.get(stage).map(Aggregate::mean)
    }

    pub fn mean_metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(Aggregate::mean)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(25)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = current;
        let due = current % self.every == 0 || current == total;
        if due && total > 0 {
            log::info!(
                "frame {current}/{total} ({:.0}%)",
                current as f64 / total as f64 * 100.0
            );
        } else if due {
            // Total unknown (e.g. stream without a frame count header).
            log::info!("frame {current}");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.stages.entry(stage.to_string()).or_default().add(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().add(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(report) = self.report() {
            log::info!("{report}");
        }
    }
}
