// Universe selection
pub mod universe;

pub use universe::UniversePicker;
