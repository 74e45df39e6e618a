//! Three independently owned state slots — authoritative, predicted,
//! interpolated — per §3's client ownership rule: replacing a slot replaces
//! the whole value, never a partial mutation.

use orbit::World;

#[derive(Default)]
pub struct StateManager {
    authoritative: Option<World>,
    predicted: Option<World>,
    interpolated: Option<World>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authoritative(&self) -> Option<&World> {
        self.authoritative.as_ref()
    }

    pub fn predicted(&self) -> Option<&World> {
        self.predicted.as_ref()
    }

    pub fn interpolated(&self) -> Option<&World> {
        self.interpolated.as_ref()
    }

    pub fn set_authoritative(&mut self, world: World) {
        self.authoritative = Some(world);
    }

    pub fn set_predicted(&mut self, world: Option<World>) {
        self.predicted = world;
    }

    pub fn set_interpolated(&mut self, world: Option<World>) {
        self.interpolated = world;
    }

    pub fn reset(&mut self) {
        self.authoritative = None;
        self.predicted = None;
        self.interpolated = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_start_empty_and_replace_wholesale() {
        let mut state = StateManager::new();
        assert!(state.authoritative().is_none());

        let world = World::default_initial();
        state.set_authoritative(world.clone());
        assert_eq!(state.authoritative(), Some(&world));

        state.set_predicted(Some(world.clone()));
        assert_eq!(state.predicted(), Some(&world));

        state.reset();
        assert!(state.authoritative().is_none());
        assert!(state.predicted().is_none());
    }
}
