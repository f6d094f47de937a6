//! The write loop.
//!
//! A fill run repeats the same step `count` times: create the target file,
//! write random buffers into it until the target size is reached, a write
//! fails, or the device is nearly full, then close it. Every step but the last
//! removes its file again so the next one starts from an empty disk.

use std::{
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::config::FillTuning;
use crate::error::{FillError, Result};
use crate::pool::DataProvider;
use crate::utils::{format_eta, format_size};

mod target;
mod window;

pub use target::{Clock, FillTarget, LocalDisk, SystemClock};
pub use window::{StatRecord, ThroughputWindow};

/// What to fill, and how often.
#[derive(Debug, Clone)]
pub struct FillPlan {
    pub count: u32,
    pub path: PathBuf,
    pub target_size: Option<u64>,
}

impl FillPlan {
    /// Validates the arguments of a run before anything touches the disk.
    ///
    /// The parent directory must exist and the target itself must not.
    pub fn new(count: u32, path: PathBuf, target_size: Option<u64>) -> Result<Self> {
        if count == 0 {
            return Err(FillError::InvalidCount(count));
        }
        if target_size == Some(0) {
            return Err(FillError::InvalidSize("0: must be > 0".to_string()));
        }

        let plan = FillPlan {
            count,
            path,
            target_size,
        };
        if !plan.parent_dir().is_dir() {
            return Err(FillError::InvalidParent(plan.path));
        }
        match fs::symlink_metadata(&plan.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(plan),
            _ => Err(FillError::AlreadyExists(plan.path)),
        }
    }

    pub fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

/// Remaining-time estimate of a progress update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    Remaining(Duration),
    NoSpeed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillProgress {
    pub step: u32,
    pub written: u64,
    /// Bytes per second since the previous sample.
    pub speed: f64,
    /// Set once the sliding window is full.
    pub average_speed: Option<f64>,
    pub estimate: Option<Estimate>,
    pub nearly_full: bool,
}

impl fmt::Display for FillProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step: {}, speed: {}/s (written: {}) ...",
            self.step,
            format_size(self.speed as u64),
            format_size(self.written)
        )?;
        match self.estimate {
            Some(Estimate::Remaining(eta)) => write!(f, ", estimated time: {}", format_eta(eta))?,
            Some(Estimate::NoSpeed) => write!(f, ", no speed")?,
            None => {}
        }
        if self.nearly_full {
            write!(f, ", nearly full")?;
        }
        Ok(())
    }
}

/// Receives progress while a step is writing.
pub trait Progress {
    fn update(&mut self, progress: &FillProgress);
    fn step_done(&mut self, report: &StepReport);
}

/// Discards all progress.
#[derive(Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn update(&mut self, _progress: &FillProgress) {}
    fn step_done(&mut self, _report: &StepReport) {}
}

#[derive(Debug)]
pub enum StopReason {
    TargetReached,
    /// Throughput collapsed with almost nothing left to write.
    NearlyFull,
    ShortWrite { written: usize, expected: usize },
    WriteFailed(io::Error),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TargetReached => write!(f, "target size reached"),
            StopReason::NearlyFull => write!(f, "nearly full"),
            StopReason::ShortWrite { written, expected } => {
                write!(f, "short write, {written} of {expected} bytes")
            }
            StopReason::WriteFailed(e) => write!(f, "err={e}"),
        }
    }
}

#[derive(Debug)]
pub struct StepReport {
    pub step: u32,
    pub written: u64,
    pub stop: StopReason,
    pub path: PathBuf,
    /// Whether the file was left on disk.
    pub kept: bool,
}

enum WriteOutcome {
    Full(usize),
    Short { written: usize, expected: usize },
    Failed(io::Error),
}

pub struct FillDriver<'p, T: FillTarget, C: Clock> {
    provider: &'p mut DataProvider,
    target: T,
    clock: C,
    tuning: FillTuning,
}

impl<'p, T: FillTarget, C: Clock> FillDriver<'p, T, C> {
    pub fn new(provider: &'p mut DataProvider, target: T, clock: C, tuning: FillTuning) -> Self {
        FillDriver {
            provider,
            target,
            clock,
            tuning,
        }
    }

    /// Runs every step of `plan`.
    ///
    /// Write errors only end the step they happen in. Failing to create or
    /// remove the file aborts the run, since later steps would then measure a
    /// disk in an unknown state.
    pub fn run(&mut self, plan: &FillPlan, progress: &mut impl Progress) -> Result<Vec<StepReport>> {
        let disk_avail = self.target.available_space(plan.parent_dir());
        let abs_path = std::path::absolute(&plan.path).unwrap_or_else(|_| plan.path.clone());
        info!(
            "fill {} times to file: {}, disk avail={}",
            plan.count,
            plan.path.display(),
            format_size(disk_avail)
        );
        if let Some(size) = plan.target_size {
            info!("fill up to {}", format_size(size));
        }

        let mut reports = Vec::with_capacity(plan.count as usize);
        for step in 1..=plan.count {
            let mut report = self.run_step(step, plan, disk_avail, progress)?;
            report.path = abs_path.clone();
            report.kept = step == plan.count;
            progress.step_done(&report);
            info!(
                "fill step {} written {} to {} ({})",
                step,
                format_size(report.written),
                abs_path.display(),
                report.stop
            );

            if !report.kept {
                info!("fill step {} removes file {}", step, abs_path.display());
                self.target
                    .remove(&plan.path)
                    .map_err(|source| FillError::Remove {
                        path: plan.path.clone(),
                        source,
                    })?;
            } else {
                info!("fill step {} (final) keeps file {}", step, abs_path.display());
            }
            reports.push(report);
        }
        Ok(reports)
    }

    fn run_step(
        &mut self,
        step: u32,
        plan: &FillPlan,
        disk_avail: u64,
        progress: &mut impl Progress,
    ) -> Result<StepReport> {
        info!("fill step {}, write to {}", step, plan.path.display());
        let mut file = self
            .target
            .create(&plan.path)
            .map_err(|source| FillError::Create {
                path: plan.path.clone(),
                source,
            })?;

        // total the remaining ratio is measured against, 0 when unknown
        let total = plan.target_size.unwrap_or(disk_avail);
        let interval = self.tuning.sample_interval();
        let mut written = 0u64;
        let mut window = ThroughputWindow::new(
            self.tuning.window_size,
            StatRecord {
                at: self.clock.now(),
                written,
            },
        );

        let stop = loop {
            let limit = plan.target_size.map(|size| size - written);
            match self.write_next(&mut file, limit) {
                WriteOutcome::Full(n) => written += n as u64,
                WriteOutcome::Short {
                    written: n,
                    expected,
                } => {
                    written += n as u64;
                    warn!("fill step {} stops, short write {} of {} bytes", step, n, expected);
                    break StopReason::ShortWrite {
                        written: n,
                        expected,
                    };
                }
                WriteOutcome::Failed(e) => {
                    warn!("fill step {} stops, err={}", step, e);
                    break StopReason::WriteFailed(e);
                }
            }

            let now = self.clock.now();
            let last_at = window.last().map_or(now, |record| record.at);
            if now.saturating_duration_since(last_at) > interval {
                let speed = window.push(StatRecord { at: now, written });
                let mut update = FillProgress {
                    step,
                    written,
                    speed,
                    average_speed: None,
                    estimate: None,
                    nearly_full: false,
                };
                if window.is_full() {
                    update.average_speed = Some(window.average_speed());
                    self.assess(&mut update, total);
                    window.evict_oldest();
                }
                progress.update(&update);
                if update.nearly_full {
                    info!(
                        "fill step {} nearly full at {}, stopping",
                        step,
                        format_size(written)
                    );
                    break StopReason::NearlyFull;
                }
            }

            if plan.target_size.is_some_and(|size| written >= size) {
                break StopReason::TargetReached;
            }
        };

        if let Err(e) = file.flush() {
            warn!("fill step {} flush failed, err={}", step, e);
        }
        drop(file);
        debug!("fill step {} closed after {}", step, format_size(written));

        Ok(StepReport {
            step,
            written,
            stop,
            path: plan.path.clone(),
            kept: false,
        })
    }

    /// Fills in the estimate and near-full verdict once the window is full.
    ///
    /// An unknown total counts as nothing left, so a collapsing speed alone
    /// ends the step.
    fn assess(&self, update: &mut FillProgress, total: u64) {
        let average = update.average_speed.unwrap_or(0.0);
        let remaining = total.saturating_sub(update.written);
        let ratio = if total > 0 {
            remaining as f64 / total as f64
        } else {
            0.0
        };

        update.estimate = Some(if average > 0.0 {
            Estimate::Remaining(
                Duration::try_from_secs_f64(remaining as f64 / average).unwrap_or(Duration::MAX),
            )
        } else {
            Estimate::NoSpeed
        });
        update.nearly_full =
            average < self.tuning.slow_speed_floor && ratio < self.tuning.remaining_ratio_floor;
    }

    /// Writes one pooled buffer, cut to `limit` bytes when set.
    fn write_next(&mut self, file: &mut impl Write, limit: Option<u64>) -> WriteOutcome {
        let buf = self.provider.acquire();
        let len = match limit {
            Some(left) => buf.len().min(usize::try_from(left).unwrap_or(usize::MAX)),
            None => buf.len(),
        };
        loop {
            match file.write(&buf[..len]) {
                Ok(n) if n == len => return WriteOutcome::Full(n),
                Ok(n) => {
                    return WriteOutcome::Short {
                        written: n,
                        expected: len,
                    };
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return WriteOutcome::Failed(e),
            }
        }
    }
}
