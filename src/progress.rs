//! A console progress bar that follows the simulated timeline.
//!
//! The runner initializes it with the number of days when `--progress` is
//! given; `Context::execute` then advances it with the current time. When no
//! bar was initialized the update is a no-op, so library users and tests are
//! unaffected.
use std::sync::OnceLock;

use log::{trace, warn};
use progress_bar::{
    finalize_progress_bar, init_progress_bar, set_progress_bar_action,
    set_progress_bar_progress, Color, Style,
};

/// The `f64` end of the timeline, kept to finalize the bar exactly at the end.
static MAX_TIME: OnceLock<f64> = OnceLock::new();

/// Initialize the progress bar with the time at which the simulation ends.
pub fn init_timeline_progress_bar(max_time: f64) {
    trace!("initializing timeline progress bar with max time {max_time}");
    if MAX_TIME.set(max_time).is_err() {
        warn!("timeline progress bar already initialized");
        return;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let days = max_time.round() as usize;
    init_progress_bar(days);
    set_progress_bar_action("Day", Color::Blue, Style::Bold);
}

/// Moves the timeline progress bar to `current_time`.
#[allow(clippy::float_cmp)]
pub(crate) fn update_timeline_progress(current_time: f64) {
    let Some(&max_time) = MAX_TIME.get() else {
        return;
    };
    let current_time = current_time.min(max_time);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let day = current_time.round() as usize;
    set_progress_bar_progress(day);
    if current_time == max_time {
        finalize_progress_bar();
    }
}
