mod config;
mod elab_error;
mod elaborator;
mod multi_pass_elab;

pub use config::ElabConfig;
pub use elab_error::{ElabError, ElabErrorKind, ElabStackEntry, ElabStackKind};
pub use elaborator::{Elaboratable, Elaborator};
pub use multi_pass_elab::{elaborate, elaborate_all, ElabCtx, ElabPass, FullElaborator, MultiPassElaborator};
