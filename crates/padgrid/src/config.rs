//! Per-tree configuration.
//!
//! Diagnostics and timing knobs live on the tree instead of in process
//! globals, so independent trees (and tests) do not interfere with each
//! other.

use std::time::Duration;

/// Default delay before a flashed LED inversion reverts.
pub const DEFAULT_FLASH_DELAY: Duration = Duration::from_millis(75);

/// Default number of on/off cycles for an indicate blink.
pub const DEFAULT_INDICATE_REPEAT: usize = 2;

/// Default interval between indicate blink steps.
pub const DEFAULT_INDICATE_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration for a view tree.
///
/// The trace flags gate per-event diagnostics emitted through `tracing`;
/// they default to off because button and LED traffic is high-volume.
/// `indicate_on_structure_change` swaps the plain repaint that follows
/// add/remove/attach/detach for a visible blink of the affected region.
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Log every button press/release routed through the tree.
    pub trace_button_events: bool,
    /// Log every LED refresh and forwarding decision.
    pub trace_led_events: bool,
    /// Blink regions affected by structural changes instead of repainting.
    pub indicate_on_structure_change: bool,
    /// How long a flash inversion stays active before reverting.
    pub flash_delay: Duration,
    /// How many on/off cycles an indicate blink runs.
    pub indicate_repeat: usize,
    /// Delay between indicate blink steps.
    pub indicate_interval: Duration,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            trace_button_events: false,
            trace_led_events: false,
            indicate_on_structure_change: false,
            flash_delay: DEFAULT_FLASH_DELAY,
            indicate_repeat: DEFAULT_INDICATE_REPEAT,
            indicate_interval: DEFAULT_INDICATE_INTERVAL,
        }
    }
}
