use super::interface::KEY_B;
use super::{delegated, parse_int, CommandError, CommandResult, Interpreter};
use crate::snapshot::strip_option_prefix;
use hexbridge_world::Simulation;

impl<S: Simulation> Interpreter<S> {
    fn require_dialogue(&self) -> Result<(), CommandError> {
        match self.world.dialogue() {
            Some(_) => Ok(()),
            None => Err(CommandError::Rejected("not_in_dialogue")),
        }
    }

    fn select_option(&mut self, index: usize) -> CommandResult {
        self.world
            .select_dialogue_option(index)
            .map_err(delegated("option_selection_failed"))?;
        Ok("option_selected=1".to_string())
    }

    /// `say <n>` with a 1-based option number.
    pub(super) fn say(&mut self, args: &[String]) -> CommandResult {
        self.require_dialogue()?;
        let token = args.first().ok_or(CommandError::Usage("say <option_number>"))?;
        let option = parse_int(token)
            .filter(|n| *n > 0)
            .ok_or(CommandError::Rejected("invalid_option_number"))?;
        self.select_option(option as usize - 1)
    }

    pub(super) fn barter(&mut self) -> CommandResult {
        self.require_dialogue()?;
        Ok(self.queue_key(KEY_B))
    }

    /// Leave the conversation through the first farewell-looking option, else the last one.
    pub(super) fn end_dialogue(&mut self) -> CommandResult {
        let dialogue = self
            .world
            .dialogue()
            .ok_or(CommandError::Rejected("not_in_dialogue"))?;
        if dialogue.options.is_empty() {
            return Err(CommandError::Rejected("no_dialogue_options"));
        }
        let index = dialogue
            .options
            .iter()
            .position(|option| self.dialogue_end.matches(strip_option_prefix(option)))
            .unwrap_or(dialogue.options.len() - 1);
        self.select_option(index)
    }
}
