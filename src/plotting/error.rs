// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlotError {
    #[cfg(not(feature = "plotting"))]
    #[error("cbf-verify was not compiled with the \"plotting\" feature.\nYou need to compile cbf-verify from source with this feature to make plots.")]
    NoPlottingFeature,

    #[cfg(feature = "plotting")]
    #[error("Nothing to plot for '{0}'")]
    NoData(String),

    #[cfg(feature = "plotting")]
    #[error("Error from the plotters library: {0}")]
    Draw(#[from] super::drawing::DrawError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
