use super::{delegated, int_arg, CommandError, CommandResult, Interpreter};
use hexbridge_core::{HitLocation, ItemType, ObjectId};
use hexbridge_world::Simulation;

impl<S: Simulation> Interpreter<S> {
    fn require_combat(&self) -> Result<(), CommandError> {
        match self.world.combat() {
            Some(_) => Ok(()),
            None => Err(CommandError::Rejected("not_in_combat")),
        }
    }

    /// `attack <target_id> [body_part]`.
    ///
    /// An aimed attack outside combat only starts combat; the aim applies from the next attack.
    pub(super) fn attack(&mut self, args: &[String]) -> CommandResult {
        if args.is_empty() {
            return Err(CommandError::Usage("attack <target_id> [body_part]"));
        }
        let player = self.player_id()?;
        let target = ObjectId(int_arg(args, 0, "invalid_target_id")?);
        if self.world.object(target).is_none() {
            return Err(CommandError::Rejected("target_not_found"));
        }

        let Some(part) = args.get(1) else {
            self.world.start_combat(target);
            return Ok("attack_started=1".to_string());
        };
        let location =
            HitLocation::parse(part).ok_or(CommandError::Rejected("invalid_body_part"))?;
        let Some(combat) = self.world.combat() else {
            self.world.start_combat(target);
            return Ok("combat_started=1 body_part_ignored_until_combat".to_string());
        };
        if combat.whose_turn != Some(player) {
            return Err(CommandError::Rejected("not_players_turn"));
        }
        self.world
            .attack(target, location)
            .map_err(delegated("attack_failed"))?;
        Ok("attack_started=1".to_string())
    }

    pub(super) fn end_turn(&mut self) -> CommandResult {
        self.require_combat()?;
        self.world.end_turn();
        Ok("turn_ended=1".to_string())
    }

    /// Reload the weapon in the active hand.
    pub(super) fn reload(&mut self) -> CommandResult {
        let active = self
            .world
            .active_item()
            .ok_or(CommandError::Rejected("no_active_item"))?;
        if !active.is_item_type(ItemType::Weapon) {
            return Err(CommandError::Rejected("active_item_not_weapon"));
        }
        let weapon = active.id;
        self.world
            .reload(weapon)
            .map_err(delegated("reload_failed"))?;
        Ok("reloaded=1".to_string())
    }

    pub(super) fn change_weapon(&mut self) -> CommandResult {
        self.world
            .change_weapon()
            .map_err(delegated("change_weapon_failed"))?;
        Ok("weapon_changed=1".to_string())
    }

    pub(super) fn flee(&mut self) -> CommandResult {
        self.require_combat()?;
        self.world.end_combat();
        Ok("flee_attempted=1".to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::*;
    use hexbridge_core::{ItemType, ObjectFlags, ObjectId};
    use hexbridge_testkit::{critter, item, player, weapon, with_inventory, ScenarioBuilder};
    use hexbridge_world::{SandboxWorld, WorldQuery};
    use serde_json::json;

    type SandboxInterpreter = crate::commands::Interpreter<SandboxWorld>;

    fn arena() -> ScenarioBuilder {
        ScenarioBuilder::default()
            .player(player(1, 100))
            .object(critter(4, "Raider", 101, 10, 1))
            .object(item(5, "Bottle", 102, ItemType::Misc))
    }

    fn raider_hp(it: &SandboxInterpreter) -> Option<i32> {
        it.world().object(ObjectId(4)).and_then(|o| o.critter()).map(|c| c.hp)
    }

    #[test]
    fn attack_validates_target_and_body_part() {
        let mut it = interpreter(arena());
        assert_eq!(error(&mut it, "attack"), "usage=attack <target_id> [body_part]");
        assert_eq!(error(&mut it, "attack raider"), "invalid_target_id");
        assert_eq!(error(&mut it, "attack 40"), "target_not_found");
        assert_eq!(error(&mut it, "attack 4 tail"), "invalid_body_part");
        assert!(it.world().combat().is_none());
    }

    #[test]
    fn aimed_attack_outside_combat_only_starts_combat() {
        let mut it = interpreter(arena());
        assert_eq!(
            ok(&mut it, "attack 4 head"),
            "combat_started=1 body_part_ignored_until_combat"
        );
        assert!(it.world().combat().is_some());
        assert_eq!(raider_hp(&it), Some(10));

        assert_eq!(ok(&mut it, "attack 4 head"), "attack_started=1");
        assert_eq!(raider_hp(&it), Some(4));
        assert_eq!(ok(&mut it, "attack 4 eyes"), "attack_started=1");
        assert_eq!(raider_hp(&it), Some(0));
        assert_eq!(error(&mut it, "attack 4 torso"), "attack_failed");
    }

    #[test]
    fn aimed_attack_needs_the_players_turn() {
        let mut it = interpreter(arena().set("combat", json!({ "whose_turn": 4 })));
        assert_eq!(error(&mut it, "attack 4 groin"), "not_players_turn");
    }

    #[test]
    fn end_turn_and_flee_need_combat() {
        let mut it = interpreter(arena());
        assert_eq!(error(&mut it, "end_turn"), "not_in_combat");
        assert_eq!(error(&mut it, "flee"), "not_in_combat");
        ok(&mut it, "attack 4");
        assert_eq!(ok(&mut it, "end_turn"), "turn_ended=1");
        assert_eq!(ok(&mut it, "flee"), "flee_attempted=1");
        assert!(it.world().combat().is_none());
    }

    #[test]
    fn reload_uses_the_active_weapon() {
        let mut it = interpreter(arena());
        assert_eq!(error(&mut it, "reload"), "no_active_item");

        let mut pistol = weapon(10, "Pistol", 6);
        pistol.flags = ObjectFlags::RIGHT_HAND;
        let mut rock = item(12, "Rock", -1, ItemType::Misc);
        rock.flags = ObjectFlags::LEFT_HAND;
        let ammo = item(11, "10mm", -1, ItemType::Ammo);
        let armed = with_inventory(player(1, 100), vec![pistol, ammo, rock]);
        let mut it = interpreter(ScenarioBuilder::default().player(armed));
        assert_eq!(ok(&mut it, "reload"), "reloaded=1");
        assert_eq!(error(&mut it, "reload"), "reload_failed");
        assert_eq!(ok(&mut it, "change_weapon"), "weapon_changed=1");
        assert_eq!(error(&mut it, "reload"), "active_item_not_weapon");
    }

    #[test]
    fn change_weapon_without_player_fails() {
        let mut it = interpreter(ScenarioBuilder::default());
        assert_eq!(error(&mut it, "change_weapon"), "change_weapon_failed");
    }
}
