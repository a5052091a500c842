// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Accumulation of assertion outcomes.
//!
//! A failed check is not an error. Every check records an [`Outcome`] and
//! carries on, so a single sweep produces a complete list of failures.


use std::fmt::Debug;

use log::{debug, info, warn};

/// The result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEntry {
    /// A description of something done to the instrument.
    Step(String),

    Outcome(Outcome),
}

/// All steps taken and checks made by a single test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub name: String,
    entries: Vec<ReportEntry>,
}

impl Report {
    pub fn new<S: Into<String>>(name: S) -> Report {
        Report {
            name: name.into(),
            entries: vec![],
        }
    }

    pub fn step<S: Into<String>>(&mut self, msg: S) {
        let msg = msg.into();
        info!("{msg}");
        self.entries.push(ReportEntry::Step(msg));
    }

    /// Record the outcome of a check, returning whether it passed.
    pub fn record<S: Into<String>>(&mut self, passed: bool, msg: S) -> bool {
        let message = msg.into();
        if passed {
            debug!("PASSED: {message}");
        } else {
            warn!("FAILED: {message}");
        }
        self.entries
            .push(ReportEntry::Outcome(Outcome { passed, message }));
        passed
    }

    pub fn passed<S: Into<String>>(&mut self, msg: S) {
        self.record(true, msg);
    }

    pub fn failed<S: Into<String>>(&mut self, msg: S) {
        self.record(false, msg);
    }

    pub fn is_true<S: Into<String>>(&mut self, condition: bool, msg: S) -> bool {
        self.record(condition, msg)
    }

    pub fn is_false<S: Into<String>>(&mut self, condition: bool, msg: S) -> bool {
        self.record(!condition, msg)
    }

    pub fn equals<T, S>(&mut self, actual: &T, expected: &T, msg: S) -> bool
    where
        T: PartialEq + Debug + ?Sized,
        S: Into<String>,
    {
        let passed = actual == expected;
        let mut message = msg.into();
        if !passed {
            message = format!("{message} (expected {expected:?}, got {actual:?})");
        }
        self.record(passed, message)
    }

    pub fn less<T, S>(&mut self, value: T, limit: T, msg: S) -> bool
    where
        T: PartialOrd + Debug,
        S: Into<String>,
    {
        let passed = value < limit;
        let mut message = msg.into();
        if !passed {
            message = format!("{message} ({value:?} is not less than {limit:?})");
        }
        self.record(passed, message)
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.entries.iter().filter_map(|e| match e {
            ReportEntry::Outcome(o) => Some(o),
            ReportEntry::Step(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes().filter(|o| !o.passed)
    }

    pub fn num_passed(&self) -> usize {
        self.outcomes().filter(|o| o.passed).count()
    }

    pub fn num_failed(&self) -> usize {
        self.failures().count()
    }

    /// Did every check pass? A report without any checks has passed.
    pub fn all_passed(&self) -> bool {
        self.num_failed() == 0
    }
}
