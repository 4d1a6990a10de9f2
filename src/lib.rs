mod molecule;
pub use molecule::*;

mod error;
pub use error::*;

mod isotopes;
pub use isotopes::*;

mod parse;
pub use parse::*;

mod labeling;
pub use labeling::*;

mod charge;
pub use charge::*;

mod nmr;
pub use nmr::*;

mod canon;
pub use canon::*;

mod equivalence;
pub use equivalence::*;

mod pipeline;
pub use pipeline::*;

pub mod io;

use tracing::Level;

/// Installs a `tracing_subscriber::fmt` subscriber logging at `level` and
/// above. Unknown levels fall back to `info`; once a subscriber is installed
/// further calls do nothing.
pub fn init_logging(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}
