// Presentation layer - Interactive console
pub mod console;
