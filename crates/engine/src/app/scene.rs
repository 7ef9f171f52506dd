use crate::world::Simulation;

use super::InputSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

/// Game-side behaviour layered over the simulation. The runner owns the simulation and lends
/// it to the scene for each call.
pub trait Scene {
    fn load(&mut self, world: &mut Simulation);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut Simulation,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut Simulation);
    fn debug_title(&self, _world: &Simulation) -> Option<String> {
        None
    }
}
