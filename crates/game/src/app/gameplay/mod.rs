mod commands;
mod driver;
mod scene;
mod script;
mod world_gen;

pub(crate) use commands::parse_script_lines;
pub(crate) use driver::{CommandDriver, DriverSummary};
pub(crate) use scene::GridScene;
pub(crate) use world_gen::generate_terrain;
