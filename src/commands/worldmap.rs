use super::interface::KEY_ESCAPE;
use super::{delegated, int_arg, join_tokens, CommandError, CommandResult, Interpreter};
use hexbridge_core::normalize_name;
use hexbridge_world::Simulation;

/// Number of save slots.
const SAVE_SLOTS: i32 = 10;

impl<S: Simulation> Interpreter<S> {
    fn require_worldmap(&self) -> Result<(), CommandError> {
        match self.world.worldmap() {
            Some(_) => Ok(()),
            None => Err(CommandError::Rejected("not_on_worldmap")),
        }
    }

    pub(super) fn worldmap(&mut self) -> CommandResult {
        self.world
            .leave_map()
            .map_err(delegated("worldmap_transition_failed"))?;
        Ok("worldmap_requested=1".to_string())
    }

    /// Travel to a known location, matched by normalized name.
    pub(super) fn travel(&mut self, args: &[String]) -> CommandResult {
        if args.is_empty() {
            return Err(CommandError::Usage("travel <location_name>"));
        }
        self.require_worldmap()?;
        let wanted = normalize_name(&join_tokens(args));
        let town = self
            .world
            .towns()
            .into_iter()
            .find(|town| normalize_name(&town.name) == wanted)
            .ok_or(CommandError::Rejected("unknown_location"))?;
        if !town.known {
            return Err(CommandError::Rejected("location_not_known"));
        }
        self.world.request_travel(town.index);
        Ok(format!("travel_requested={}", town.index))
    }

    pub(super) fn cancel(&mut self) -> CommandResult {
        self.require_worldmap()?;
        Ok(self.queue_key(KEY_ESCAPE))
    }

    /// `save <slot>`: slots are numbered 1..=10; 0 is accepted as the first slot.
    pub(super) fn save(&mut self, args: &[String]) -> CommandResult {
        if args.is_empty() {
            return Err(CommandError::Usage("save <slot>"));
        }
        let mut slot = int_arg(args, 0, "invalid_slot")?;
        if (1..=SAVE_SLOTS).contains(&slot) {
            slot -= 1;
        }
        let index = u32::try_from(slot)
            .ok()
            .filter(|index| *index < SAVE_SLOTS as u32)
            .ok_or(CommandError::Rejected("slot_out_of_range"))?;
        self.world
            .save_game(index)
            .map_err(delegated("save_failed"))?;
        Ok(format!("saved_slot={}", index + 1))
    }
}
