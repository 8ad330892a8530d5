pub mod bootstrap;
pub mod commands;
pub mod cycle_tracker;
pub mod plan_editor;
pub mod schedule;
