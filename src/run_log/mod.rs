// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The log and timers of a single simulation or imaging run.
//!
//! Messages are forwarded to the [`log`] crate as usual, and are also kept so
//! that they can be written into the HISTORY of output files.


use std::time::{Duration, Instant};

use indexmap::IndexMap;
use log::{log, Level};

#[derive(Debug, Default, Clone, Copy)]
struct Timer {
    elapsed: Duration,
    started: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct RunLog {
    timers: IndexMap<String, Timer>,
    lines: Vec<String>,
}

impl RunLog {
    pub fn new() -> RunLog {
        RunLog::default()
    }

    /// Start (or continue) accumulating time against the named timer. Timers
    /// are created on first use. Resuming a running timer does nothing.
    pub fn timer_resume(&mut self, name: &str) {
        let timer = self.timers.entry(name.to_string()).or_default();
        if timer.started.is_none() {
            timer.started = Some(Instant::now());
        }
    }

    /// Stop accumulating time against the named timer.
    pub fn timer_pause(&mut self, name: &str) {
        if let Some(timer) = self.timers.get_mut(name) {
            if let Some(started) = timer.started.take() {
                timer.elapsed += started.elapsed();
            }
        }
    }

    /// The total time accumulated by the named timer, including any currently
    /// running interval. Unknown timers have zero elapsed time.
    pub fn timer_elapsed(&self, name: &str) -> Duration {
        self.timers
            .get(name)
            .map(|t| t.elapsed + t.started.map(|s| s.elapsed()).unwrap_or_default())
            .unwrap_or_default()
    }

    /// Log a message and keep it for the HISTORY.
    pub fn message<S: Into<String>>(&mut self, level: Level, msg: S) {
        let msg = msg.into();
        log!(level, "{msg}");
        self.lines.push(msg);
    }

    pub fn info<S: Into<String>>(&mut self, msg: S) {
        self.message(Level::Info, msg)
    }

    pub fn warn<S: Into<String>>(&mut self, msg: S) {
        self.message(Level::Warn, msg)
    }

    pub fn debug<S: Into<String>>(&mut self, msg: S) {
        self.message(Level::Debug, msg)
    }

    /// Take the lines and timers of another log, e.g. one kept by a worker
    /// thread. Time accumulated against timers of the same name is added
    /// together.
    pub fn merge(&mut self, other: RunLog) {
        for (name, timer) in other.timers {
            let elapsed = timer.elapsed + timer.started.map(|s| s.elapsed()).unwrap_or_default();
            self.timers.entry(name).or_default().elapsed += elapsed;
        }
        self.lines.extend(other.lines);
    }

    /// Everything logged so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The logged text as FITS HISTORY records: one record per line, with
    /// carriage returns replaced by spaces.
    pub fn history_records(&self) -> Vec<String> {
        self.lines
            .iter()
            .flat_map(|l| l.split('\n'))
            .map(|l| l.replace('\r', " "))
            .collect()
    }

    /// Log the time spent in each of `sections` relative to the time of
    /// `total`.
    pub fn timing_summary(&mut self, total: &str, sections: &[&str]) {
        let total_time = self.timer_elapsed(total).as_secs_f64();
        self.info(format!("Completed after {total_time:.3} seconds"));
        if total_time <= 0.0 {
            return;
        }
        let mut accounted = 0.0;
        for &section in sections {
            let t = self.timer_elapsed(section).as_secs_f64();
            accounted += t;
            self.info(format!(
                "  {:>5.1}% ({t:.3} s) {section}",
                100.0 * t / total_time
            ));
        }
        let other = (total_time - accounted).max(0.0);
        self.info(format!(
            "  {:>5.1}% ({other:.3} s) Other",
            100.0 * other / total_time
        ));
    }
}
