#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the `cchf_map` binary.
//!
//! Binning passes over notifications and raster points report through
//! [`ProgressCallback`]; [`IndicatifProgress`] draws them. [`init_logger`]
//! routes log records through the same [`MultiProgress`] so a bar is
//! never torn by a log line.

use std::sync::Arc;
use std::time::Duration;

use cchf_map_spatial::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

const LOADING_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const BINNING_TEMPLATE: &str = "  {msg} {wide_bar:.cyan/dim} {pos}/{len} {percent}% [{eta}]";

/// Progress of one binning pass, drawn as an `indicatif` bar.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Counted style, used once the number of points is known.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Adds a bar for a binning pass to `multi`.
    ///
    /// Shows a spinner while points are still being loaded and switches
    /// to a counted bar when the binner reports its total.
    #[must_use]
    pub fn points_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        Arc::new(Self::with_bar(bar, message))
    }

    fn with_bar(bar: ProgressBar, message: &str) -> Self {
        bar.set_style(
            ProgressStyle::with_template(LOADING_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(BINNING_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self { bar, bar_style }
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs `pretty_env_logger` (filtered by `RUST_LOG`) behind
/// `indicatif-log-bridge`.
///
/// Binning bars must be added to the returned [`MultiProgress`] for log
/// output to stay clear of them.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
