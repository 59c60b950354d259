use super::{delegated, join_tokens, parse_int, CommandError, CommandResult, Interpreter};
use hexbridge_core::{Skill, SpecialStat, Trait};
use hexbridge_world::{EditorMode, Simulation};

impl<S: Simulation> Interpreter<S> {
    fn require_creation(&self, rejection: &'static str) -> Result<(), CommandError> {
        if self.world.interface().editor == Some(EditorMode::Creation) {
            Ok(())
        } else {
            Err(CommandError::Rejected(rejection))
        }
    }

    /// `stat_inc` (`delta = 1`) and `stat_dec` (`delta = -1`).
    pub(super) fn stat_change(&mut self, args: &[String], delta: i32) -> CommandResult {
        let token = args
            .first()
            .ok_or(CommandError::Usage("stat_inc <stat> or stat_dec <stat>"))?;
        self.require_creation("stat_changes_available_only_in_chargen")?;
        self.player()?;
        let stat =
            SpecialStat::from_name(token).ok_or(CommandError::Rejected("invalid_special_stat"))?;

        let failure = if delta > 0 {
            if self.world.chargen().character_points <= 0 {
                return Err(CommandError::Rejected("no_character_points_remaining"));
            }
            "stat_increase_failed"
        } else {
            "stat_decrease_failed"
        };
        let value = self
            .world
            .adjust_stat(stat, delta)
            .map_err(delegated(failure))?;
        Ok(format!(
            "stat={}\nvalue={value}\nremaining_points={}",
            stat.name(),
            self.world.chargen().character_points
        ))
    }

    /// Toggle a tag skill. Untagging is always allowed.
    pub(super) fn tag_skill(&mut self, args: &[String]) -> CommandResult {
        if args.is_empty() {
            return Err(CommandError::Usage("tag_skill <skill_name>"));
        }
        self.require_creation("tag_skill_available_only_in_chargen")?;
        let skill =
            Skill::from_name(&join_tokens(args)).ok_or(CommandError::Rejected("invalid_skill"))?;

        let chargen = self.world.chargen();
        if !chargen.tagged_skills.contains(&skill) && chargen.tag_skills_remaining <= 0 {
            return Err(CommandError::Rejected("no_tag_skill_slots_remaining"));
        }
        self.world
            .toggle_tag_skill(skill)
            .map_err(delegated("tag_skill_toggle_failed"))?;

        let chargen = self.world.chargen();
        Ok(format!(
            "skill={}\ntagged={}\nremaining_tag_skills={}",
            skill.name(),
            u8::from(chargen.tagged_skills.contains(&skill)),
            chargen.tag_skills_remaining
        ))
    }

    /// Toggle a trait by name, 1-based index, or index 0.
    pub(super) fn trait_select(&mut self, args: &[String]) -> CommandResult {
        if args.is_empty() {
            return Err(CommandError::Usage("trait_select <trait_name_or_index>"));
        }
        self.require_creation("trait_select_available_only_in_chargen")?;
        let name = join_tokens(args);
        let selected = match parse_int(&name) {
            Some(index @ 1..=16) => Trait::from_index(index as usize - 1),
            Some(0) => Trait::from_index(0),
            Some(_) => None,
            None => Trait::from_name(&name),
        }
        .ok_or(CommandError::Rejected("invalid_trait"))?;

        let chargen = self.world.chargen();
        if !chargen.traits.contains(&selected) && chargen.traits_remaining <= 0 {
            return Err(CommandError::Rejected("no_trait_slots_remaining"));
        }
        self.world
            .toggle_trait(selected)
            .map_err(delegated("trait_toggle_failed"))?;

        let chargen = self.world.chargen();
        Ok(format!(
            "trait={}\nselected={}\nremaining_traits={}",
            selected.name(),
            u8::from(chargen.traits.contains(&selected)),
            chargen.traits_remaining
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::*;
    use hexbridge_testkit::{body_fields, player, ScenarioBuilder};
    use serde_json::json;

    fn creation(points: i32) -> ScenarioBuilder {
        ScenarioBuilder::default().player(player(1, 100)).chargen(points)
    }

    #[test]
    fn stat_changes_need_the_creation_editor() {
        let mut it = interpreter(ScenarioBuilder::default().player(player(1, 100)));
        assert_eq!(error(&mut it, "stat_inc"), "usage=stat_inc <stat> or stat_dec <stat>");
        assert_eq!(error(&mut it, "stat_inc str"), "stat_changes_available_only_in_chargen");

        let mut it = interpreter(ScenarioBuilder::default().chargen(1));
        assert_eq!(error(&mut it, "stat_inc str"), "player_unavailable");
    }

    #[test]
    fn stat_inc_spends_points_until_none_remain() {
        let mut it = interpreter(creation(1));
        assert_eq!(error(&mut it, "stat_inc wisdom"), "invalid_special_stat");
        let body = ok(&mut it, "stat_inc STR");
        assert_eq!(body, "stat=Strength\nvalue=6\nremaining_points=0");
        assert_eq!(error(&mut it, "stat_inc agi"), "no_character_points_remaining");
        let body = ok(&mut it, "stat_dec strength");
        assert_eq!(body_fields(&body)["remaining_points"], "1");
    }

    #[test]
    fn stat_dec_below_minimum_fails() {
        let stats = json!({ "special": [1, 5, 5, 5, 5, 5, 5] });
        let mut it = interpreter(creation(0).set("player_stats", stats));
        assert_eq!(error(&mut it, "stat_dec str"), "stat_decrease_failed");
    }

    #[test]
    fn tag_skill_toggles_and_counts_slots() {
        let mut it = interpreter(creation(0));
        assert_eq!(error(&mut it, "tag_skill"), "usage=tag_skill <skill_name>");
        assert_eq!(error(&mut it, "tag_skill juggling"), "invalid_skill");
        let body = ok(&mut it, "tag_skill small guns");
        assert_eq!(body, "skill=Small Guns\ntagged=1\nremaining_tag_skills=2");
        ok(&mut it, "tag_skill lockpick");
        ok(&mut it, "tag_skill 'First Aid'");
        assert_eq!(error(&mut it, "tag_skill speech"), "no_tag_skill_slots_remaining");
        let body = ok(&mut it, "tag_skill lockpick");
        assert_eq!(body, "skill=Lockpick\ntagged=0\nremaining_tag_skills=1");

        let mut it = interpreter(ScenarioBuilder::default().player(player(1, 100)));
        assert_eq!(error(&mut it, "tag_skill sneak"), "tag_skill_available_only_in_chargen");
    }

    #[test]
    fn trait_select_accepts_names_and_indices() {
        let mut it = interpreter(creation(0));
        assert_eq!(ok(&mut it, "trait_select 16"), "trait=Gifted\nselected=1\nremaining_traits=1");
        assert_eq!(ok(&mut it, "trait_select 0"), "trait=Fast Metabolism\nselected=1\nremaining_traits=0");
        assert_eq!(error(&mut it, "trait_select bruiser"), "no_trait_slots_remaining");
        assert_eq!(ok(&mut it, "trait_select gifted"), "trait=Gifted\nselected=0\nremaining_traits=1");
        assert_eq!(error(&mut it, "trait_select 17"), "invalid_trait");
        assert_eq!(error(&mut it, "trait_select lucky"), "invalid_trait");
    }
}
