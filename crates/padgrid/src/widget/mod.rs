//! Widgets: views configured with a value model.
//!
//! None of these types subclass anything. A widget is a plain view (or a
//! sealed container of plain views) plus a typed value model, a
//! lit-state function rendering that value, and a reaction connected to
//! the view's button-state-changed listeners. Everything a widget does
//! goes through the same public pipeline any application code would use.
//!
//! Value setters come in pairs: `set_value` silently updates and
//! repaints, `set_value_notify` additionally fires the widget's
//! value-changed listeners (used by coupled widgets reacting to button
//! input).

mod button;
mod multi_button;
mod multi_toggle;
mod step;
mod toggle;

pub use button::{Button, ButtonBehavior};
pub use multi_button::MultiButtonView;
pub use multi_toggle::MultiToggleView;
pub use step::StepView;
pub use toggle::{Orientation, Toggle};
