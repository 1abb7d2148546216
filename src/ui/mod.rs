mod card_view;
#[cfg(any(test, feature = "testing"))]
mod recording;
mod terminal;

pub use card_view::{CardControls, CardView};
#[cfg(any(test, feature = "testing"))]
pub use recording::{RecordingView, ViewCall};
pub use terminal::{TerminalView, format_update, render_summary, render_trades};
