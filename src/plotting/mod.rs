// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to plot channel responses and delay-tracking phases.

mod error;

pub use error::PlotError;

use std::path::Path;

use ndarray::prelude::*;

use crate::verify::ResponsePlotData;

#[cfg(not(feature = "plotting"))]
pub fn plot_channel_response(_data: &ResponsePlotData, _path: &Path) -> Result<(), PlotError> {
    // Plotting is an optional feature, because the C dependencies it needs
    // can't always be statically compiled.
    Err(PlotError::NoPlottingFeature)
}

/// Draw a channel response into a PNG file, along with markers for the
/// channel centre, central band and edges, and the cutoff line if there is
/// one.
#[cfg(feature = "plotting")]
pub fn plot_channel_response(data: &ResponsePlotData, path: &Path) -> Result<(), PlotError> {
    if data.freqs.is_empty() {
        return Err(PlotError::NoData(data.title.clone()));
    }
    create_parent_dir(path)?;
    drawing::channel_response(data, path)?;
    Ok(())
}

#[cfg(not(feature = "plotting"))]
pub fn plot_delay_phases(
    _chan_freqs: &[f64],
    _measured: &[(f64, Array1<f64>)],
    _path: &Path,
) -> Result<(), PlotError> {
    Err(PlotError::NoPlottingFeature)
}

/// Draw the phases measured for each delay (points) over the expected phase
/// slopes (lines) into a PNG file.
#[cfg(feature = "plotting")]
pub fn plot_delay_phases(
    chan_freqs: &[f64],
    measured: &[(f64, Array1<f64>)],
    path: &Path,
) -> Result<(), PlotError> {
    if measured.is_empty() || chan_freqs.is_empty() {
        return Err(PlotError::NoData("delay phases".to_string()));
    }
    create_parent_dir(path)?;
    drawing::delay_phases(chan_freqs, measured, path)?;
    Ok(())
}

#[cfg(feature = "plotting")]
fn create_parent_dir(path: &Path) -> Result<(), std::io::Error> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// The x range of a response plot [MHz]. The channel edges are always
/// visible.
#[cfg(feature = "plotting")]
fn freq_axis_mhz(data: &ResponsePlotData) -> (f64, f64) {
    let (min, max) = data
        .freqs
        .iter()
        .copied()
        .chain([data.markers.edges.0, data.markers.edges.1])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), f| {
            (min.min(f), max.max(f))
        });
    (min / 1e6, max / 1e6)
}

/// The y range of a response plot [dB], padded by 1 dB either side.
#[cfg(feature = "plotting")]
fn db_axis(responses_db: ArrayView1<f64>, cutoff_db: Option<f64>) -> (f64, f64) {
    let (min, max) = responses_db
        .iter()
        .copied()
        .chain(cutoff_db)
        .filter(|r| r.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), r| {
            (min.min(r), max.max(r))
        });
    if min > max {
        // Nothing finite to show.
        (-1.0, 1.0)
    } else {
        (min - 1.0, max + 1.0)
    }
}

#[cfg(feature = "plotting")]
mod drawing {
    use log::debug;
    use plotters::{prelude::*, style::RGBAColor};
    use thiserror::Error;

    use super::*;
    use crate::verify::delay::expected_phases;

    /// The number of X pixels on the plots.
    const X_PIXELS: u32 = 1600;
    /// The number of Y pixels on the plots.
    const Y_PIXELS: u32 = 900;

    lazy_static::lazy_static! {
        static ref RESPONSE: RGBAColor = BLUE.mix(1.0);

        static ref CENTRE: RGBAColor = BLACK.mix(0.8);

        static ref CENTRAL_BAND: RGBAColor = GREEN.mix(0.7);

        static ref EDGES: RGBAColor = RED.mix(0.7);

        static ref CUTOFF: RGBAColor = MAGENTA.mix(0.6);

        static ref DELAYS: [RGBAColor; 4] = [
            BLUE.mix(1.0),
            RED.mix(1.0),
            GREEN.mix(1.0),
            CYAN.mix(1.0),
        ];
    }

    pub(super) fn channel_response(
        data: &ResponsePlotData,
        path: &Path,
    ) -> Result<(), DrawError> {
        debug!("Plotting '{}' to {}", data.title, path.display());
        let root_area = BitMapBackend::new(path, (X_PIXELS, Y_PIXELS)).into_drawing_area();
        root_area
            .fill(&WHITE)
            .map_err(|e| DrawError::Plotters(Box::new(e)))?;

        let (x_min, x_max) = freq_axis_mhz(data);
        let (y_min, y_max) = db_axis(data.responses_db.view(), data.cutoff_db);
        let mut cc = ChartBuilder::on(&root_area)
            .caption(&data.title, ("sans-serif", 40))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(|e| DrawError::Response(e.to_string()))?;

        cc.configure_mesh()
            .light_line_style(&WHITE)
            .x_desc(data.x_desc)
            .y_desc("Response (dB)")
            .draw()
            .map_err(|e| DrawError::Response(e.to_string()))?;

        cc.draw_series(LineSeries::new(
            data.freqs
                .iter()
                .zip(data.responses_db.iter())
                .map(|(&f, &r)| (f / 1e6, r)),
            &*RESPONSE,
        ))
        .map_err(|e| DrawError::Response(e.to_string()))?
        .label("Response")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], *RESPONSE));

        let m = data.markers;
        let verticals = [
            ("Channel centre", *CENTRE, vec![m.centre]),
            ("Central band", *CENTRAL_BAND, vec![m.central.0, m.central.1]),
            ("Channel edges", *EDGES, vec![m.edges.0, m.edges.1]),
        ];
        for (label, colour, freqs) in verticals {
            for (i, freq) in freqs.into_iter().enumerate() {
                let x = freq / 1e6;
                let series = cc
                    .draw_series(LineSeries::new(vec![(x, y_min), (x, y_max)], &colour))
                    .map_err(|e| DrawError::Response(e.to_string()))?;
                // Only one legend entry per kind of marker.
                if i == 0 {
                    series
                        .label(label)
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], colour));
                }
            }
        }

        if let Some(cutoff) = data.cutoff_db {
            cc.draw_series(LineSeries::new(
                vec![(x_min, cutoff), (x_max, cutoff)],
                &*CUTOFF,
            ))
            .map_err(|e| DrawError::Response(e.to_string()))?
            .label(format!("{cutoff:.1} dB"))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], *CUTOFF));
        }

        cc.configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(|e| DrawError::Response(e.to_string()))?;

        root_area
            .present()
            .map_err(|e| DrawError::Plotters(Box::new(e)))?;
        Ok(())
    }

    pub(super) fn delay_phases(
        chan_freqs: &[f64],
        measured: &[(f64, Array1<f64>)],
        path: &Path,
    ) -> Result<(), DrawError> {
        debug!("Plotting delay phases to {}", path.display());
        let root_area = BitMapBackend::new(path, (X_PIXELS, Y_PIXELS)).into_drawing_area();
        root_area
            .fill(&WHITE)
            .map_err(|e| DrawError::Plotters(Box::new(e)))?;

        let x_min = chan_freqs.first().copied().unwrap_or(0.0) / 1e6;
        let x_max = chan_freqs.last().copied().unwrap_or(1.0) / 1e6;
        let mut cc = ChartBuilder::on(&root_area)
            .caption("Delay tracking phases", ("sans-serif", 40))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(x_min..x_max, -180.0..180.0)
            .map_err(|e| DrawError::Phases(e.to_string()))?;

        cc.configure_mesh()
            .light_line_style(&WHITE)
            .x_desc("Channel frequency (MHz)")
            .y_desc("Phase (degrees)")
            .draw()
            .map_err(|e| DrawError::Phases(e.to_string()))?;

        for ((delay, actual), colour) in measured.iter().zip(DELAYS.iter().cycle()) {
            let colour = *colour;
            let expected = expected_phases(chan_freqs, *delay);
            cc.draw_series(LineSeries::new(
                chan_freqs
                    .iter()
                    .zip(expected.iter())
                    .map(|(&f, &p)| (f / 1e6, p.to_degrees())),
                &colour,
            ))
            .map_err(|e| DrawError::Phases(e.to_string()))?
            .label(format!("{:.3} ns", delay * 1e9))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], colour));

            cc.draw_series(PointSeries::of_element(
                chan_freqs
                    .iter()
                    .zip(actual.iter())
                    .filter(|(_, p)| !p.is_nan())
                    .map(|(&f, &p)| (f / 1e6, p.to_degrees())),
                2,
                ShapeStyle::from(&colour).filled(),
                &|coord, size, style| EmptyElement::at(coord) + Circle::new((0, 0), size, style),
            ))
            .map_err(|e| DrawError::Phases(e.to_string()))?;
        }

        cc.configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(|e| DrawError::Phases(e.to_string()))?;

        root_area
            .present()
            .map_err(|e| DrawError::Plotters(Box::new(e)))?;
        Ok(())
    }

    #[derive(Error, Debug)]
    pub enum DrawError {
        #[error("While plotting a channel response: {0}")]
        Response(String),

        #[error("While plotting phases: {0}")]
        Phases(String),

        #[error("Error from the plotters library: {0}")]
        Plotters(Box<dyn std::error::Error>),
    }
}
