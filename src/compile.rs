pub mod feature;
pub mod schedule;
