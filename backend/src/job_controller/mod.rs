pub mod housekeeping;
pub mod state;
