pub mod completions;
pub mod inspect;
pub mod optimize;
