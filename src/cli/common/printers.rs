// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Test setups, results and warnings are logged as a small tree under a bold
//! title.

use std::{borrow::Cow, sync::Mutex};

use log::Level;

const VERTICAL: char = '│';
const UP_AND_RIGHT: char = '└';
const VERTICAL_AND_RIGHT: char = '├';

lazy_static::lazy_static! {
    static ref WARNINGS: Mutex<Blocks> = Mutex::new(Blocks::default());
}

/// Groups of lines. The first line of each group hangs off the tree; the
/// rest of the group continues underneath it.
#[derive(Debug, Default)]
pub(super) struct Blocks(Vec<Vec<Cow<'static, str>>>);

impl Blocks {
    pub(super) fn push(&mut self, block: Vec<Cow<'static, str>>) {
        self.0.push(block);
    }

    pub(super) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every line along with the tree symbol drawn before it.
    pub(super) fn lines(&self) -> impl Iterator<Item = (char, &str)> {
        let num_blocks = self.0.len();
        self.0.iter().enumerate().flat_map(move |(i_block, block)| {
            let closes_tree = i_block + 1 == num_blocks && block.len() == 1;
            block.iter().enumerate().map(move |(i_line, line)| {
                let symbol = match i_line {
                    0 if closes_tree => UP_AND_RIGHT,
                    0 => VERTICAL_AND_RIGHT,
                    _ => VERTICAL,
                };
                (symbol, line.as_ref())
            })
        })
    }

    fn log(&self, level: Level, title: &str) {
        log::log!(level, "{}", console::style(title).bold());
        for (symbol, line) in self.lines() {
            log::log!(level, "{symbol} {line}");
        }
        log::log!(level, "");
    }
}

pub(crate) struct InfoPrinter {
    title: Cow<'static, str>,
    blocks: Blocks,
}

impl InfoPrinter {
    pub(crate) fn new(title: Cow<'static, str>) -> Self {
        Self {
            title,
            blocks: Blocks::default(),
        }
    }

    pub(crate) fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    pub(crate) fn push_block(&mut self, block: Vec<Cow<'static, str>>) {
        self.blocks.push(block);
    }

    pub(crate) fn display(self) {
        self.blocks.log(Level::Info, &self.title);
    }
}

/// Queue a warning to be shown by [`display_warnings`].
pub(crate) trait Warn {
    fn warn(self);
}

impl Warn for &'static str {
    fn warn(self) {
        WARNINGS.lock().unwrap().push(vec![self.into()]);
    }
}

impl Warn for String {
    fn warn(self) {
        WARNINGS.lock().unwrap().push(vec![self.into()]);
    }
}

/// Log any queued warnings, then forget them. Called once arguments are
/// parsed, before the instrument is touched, and again by tests that only
/// find problems in what they captured.
pub(crate) fn display_warnings() {
    log::debug!("Displaying warnings");
    let mut warnings = WARNINGS.lock().unwrap();
    if warnings.is_empty() {
        return;
    }
    warnings.log(Level::Warn, "Warnings");
    *warnings = Blocks::default();
}
