use super::{delegated, int_arg, join_tokens, parse_int, CommandError, CommandResult, Interpreter, Verb};
use hexbridge_core::{ObjectId, Skill};
use hexbridge_world::Simulation;

const SECONDS_PER_HOUR: i64 = 3600;

impl<S: Simulation> Interpreter<S> {
    /// `interact`, `talk` and `pickup`: validate the target, then hand off to the simulation.
    pub(super) fn object_action(&mut self, verb: Verb, args: &[String]) -> CommandResult {
        if args.is_empty() {
            return Err(CommandError::Usage("interact|talk|pickup <object_id>"));
        }
        self.player()?;
        let target = ObjectId(int_arg(args, 0, "invalid_object_id")?);
        if self.world.object(target).is_none() {
            return Err(CommandError::Rejected("object_not_found"));
        }
        let result = match verb {
            Verb::Talk => self.world.talk_to(target),
            Verb::Pickup => self.world.pick_up(target),
            _ => self.world.use_object(target),
        };
        result.map_err(delegated("action_failed"))?;
        Ok("action_started=1".to_string())
    }

    /// `use_skill <skill name...> <target_id>`; the skill name may span several tokens.
    pub(super) fn use_skill(&mut self, args: &[String]) -> CommandResult {
        let Some((target, skill_tokens)) = args.split_last().filter(|(_, rest)| !rest.is_empty())
        else {
            return Err(CommandError::Usage("use_skill <skill_name> <target_id>"));
        };
        self.player()?;
        let target = ObjectId(parse_int(target).ok_or(CommandError::Rejected("invalid_target_id"))?);
        let skill = Skill::from_name(&join_tokens(skill_tokens))
            .ok_or(CommandError::Rejected("invalid_skill_name"))?;
        if self.world.object(target).is_none() {
            return Err(CommandError::Rejected("target_not_found"));
        }
        self.world
            .use_skill_on(skill, target)
            .map_err(delegated("skill_use_failed"))?;
        Ok("action_started=1".to_string())
    }

    /// Rest for whole hours outside combat.
    pub(super) fn wait(&mut self, args: &[String]) -> CommandResult {
        if args.is_empty() {
            return Err(CommandError::Usage("wait <hours>"));
        }
        let hours = int_arg(args, 0, "invalid_hours")?;
        if hours <= 0 {
            return Err(CommandError::Rejected("invalid_hours"));
        }
        if self.world.combat().is_some() {
            return Err(CommandError::Rejected("cannot_wait_in_combat"));
        }
        let seconds = (i64::from(hours) * SECONDS_PER_HOUR).min(i64::from(i32::MAX)) as i32;
        self.world.advance_time(seconds);
        self.world.rest_heal(hours);
        Ok(format!("hours_advanced={hours}"))
    }

    pub(super) fn sneak(&mut self) -> CommandResult {
        self.world
            .toggle_sneak()
            .map_err(delegated("sneak_toggle_failed"))?;
        Ok("sneak_toggled=1".to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::*;
    use hexbridge_core::{ItemType, ObjectId, SceneryType};
    use hexbridge_testkit::{critter, door, item, player, scenery, ScenarioBuilder};
    use hexbridge_world::WorldQuery;

    fn room() -> ScenarioBuilder {
        ScenarioBuilder::default()
            .player(player(1, 100))
            .object(door(2, 101, true))
            .object(item(3, "Rock", 102, ItemType::Misc))
            .object(critter(4, "Vic", 103, 10, 0))
            .object(scenery(5, "Terminal", 104, SceneryType::Generic))
            .dialogue(4, "Hello there.", &["Hi.", "Bye."])
    }

    #[test]
    fn object_actions_validate_before_delegating() {
        let mut it = interpreter(room());
        assert_eq!(error(&mut it, "interact"), "usage=interact|talk|pickup <object_id>");
        assert_eq!(error(&mut it, "talk vic"), "invalid_object_id");
        assert_eq!(error(&mut it, "pickup 99"), "object_not_found");
        assert_eq!(error(&mut it, "pickup 2"), "action_failed");
        assert_eq!(error(&mut it, "talk 5"), "action_failed");
    }

    #[test]
    fn pickup_moves_the_item_into_the_inventory() {
        let mut it = interpreter(room());
        assert_eq!(ok(&mut it, "pickup 3"), "action_started=1");
        assert!(it.world().object(ObjectId(3)).is_none());
        assert!(ok(&mut it, "inventory").contains("[3] name=Rock quantity=1"));
    }

    #[test]
    fn talk_opens_the_npc_dialogue() {
        let mut it = interpreter(room());
        assert_eq!(ok(&mut it, "talk 4"), "action_started=1");
        assert_eq!(it.world().dialogue().map(|d| d.reply.as_str()), Some("Hello there."));
    }

    #[test]
    fn use_skill_takes_a_multi_word_skill_name() {
        let mut it = interpreter(room());
        assert_eq!(error(&mut it, "use_skill lockpick"), "usage=use_skill <skill_name> <target_id>");
        assert_eq!(error(&mut it, "use_skill lockpick door"), "invalid_target_id");
        assert_eq!(error(&mut it, "use_skill lock picking 2"), "invalid_skill_name");
        assert_eq!(error(&mut it, "use_skill lockpick 77"), "target_not_found");
        assert_eq!(ok(&mut it, "use_skill lockpick 2"), "action_started=1");
        assert_eq!(ok(&mut it, "use_skill first aid 4"), "action_started=1");
        assert_eq!(ok(&mut it, "interact 2"), "action_started=1");
        assert!(it.world().recent_messages(1)[0].contains("open"));
    }

    #[test]
    fn wait_advances_time_and_heals() {
        let mut wounded = player(1, 100);
        if let Some(critter) = wounded.critter_mut() {
            critter.hp = 20;
        }
        let mut it = interpreter(ScenarioBuilder::default().player(wounded));
        assert_eq!(error(&mut it, "wait"), "usage=wait <hours>");
        assert_eq!(error(&mut it, "wait 0"), "invalid_hours");
        assert_eq!(error(&mut it, "wait soon"), "invalid_hours");
        assert_eq!(ok(&mut it, "wait 3"), "hours_advanced=3");
        assert_eq!(it.world().game_time_seconds(), 3 * 3600);
        assert_eq!(it.world().player().and_then(|p| p.critter()).map(|c| c.hp), Some(23));

        ok(&mut it, "wait 2000000");
        assert_eq!(it.world().game_time_seconds(), 3 * 3600 + i64::from(i32::MAX));
    }

    #[test]
    fn wait_is_refused_in_combat() {
        let mut it = interpreter(ScenarioBuilder::default().player(player(1, 100)).in_combat());
        assert_eq!(error(&mut it, "wait 1"), "cannot_wait_in_combat");
    }

    #[test]
    fn sneak_toggles() {
        let mut it = interpreter(ScenarioBuilder::default().player(player(1, 100)));
        assert_eq!(ok(&mut it, "sneak"), "sneak_toggled=1");
        assert!(it.world().sneaking());
        let mut it = interpreter(ScenarioBuilder::default());
        assert_eq!(error(&mut it, "sneak"), "sneak_toggle_failed");
    }
}
