pub mod key_figures;

pub use key_figures::{calculate_key_figures, KeyFigures, KeyFiguresRequest};
