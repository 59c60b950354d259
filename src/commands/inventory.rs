use super::{delegated, int_arg, CommandError, CommandResult, Interpreter};
use crate::channel::protocol::escape_value;
use crate::snapshot::find_carried;
use hexbridge_core::{ItemType, ObjectFlags, ObjectId, WorldObject};
use hexbridge_world::{EquipSlot, Simulation};

fn parse_slot(token: &str) -> Option<EquipSlot> {
    match token.to_ascii_lowercase().as_str() {
        "left_hand" => Some(EquipSlot::LeftHand),
        "right_hand" => Some(EquipSlot::RightHand),
        "armor" => Some(EquipSlot::Armor),
        _ => None,
    }
}

impl<S: Simulation> Interpreter<S> {
    /// Top-level stack in the player's inventory.
    fn carried(&self, args: &[String], usage: &'static str) -> Result<&WorldObject, CommandError> {
        if args.is_empty() {
            return Err(CommandError::Usage(usage));
        }
        let player = self.player()?;
        let id = ObjectId(int_arg(args, 0, "invalid_item_id")?);
        player
            .inventory
            .iter()
            .map(|entry| &entry.item)
            .find(|item| item.id == id)
            .ok_or(CommandError::Rejected("item_not_found"))
    }

    pub(super) fn equip(&mut self, args: &[String]) -> CommandResult {
        if args.len() < 2 {
            return Err(CommandError::Usage("equip <item_id> <slot>"));
        }
        let item = self.carried(args, "equip <item_id> <slot>")?;
        let slot = parse_slot(&args[1]).ok_or(CommandError::Rejected("invalid_slot"))?;
        if slot == EquipSlot::Armor && !item.is_item_type(ItemType::Armor) {
            return Err(CommandError::Rejected("item_is_not_armor"));
        }
        let id = item.id;
        self.world
            .wield(id, slot)
            .map_err(delegated("equip_failed"))?;
        Ok("equipped=1".to_string())
    }

    pub(super) fn unequip(&mut self, args: &[String]) -> CommandResult {
        let token = args.first().ok_or(CommandError::Usage("unequip <slot>"))?;
        let player = self.player()?;
        let slot = parse_slot(token).ok_or(CommandError::Rejected("invalid_slot"))?;
        let result = match slot {
            EquipSlot::Armor => {
                let worn = player
                    .inventory
                    .iter()
                    .any(|entry| entry.item.flags.contains(ObjectFlags::WORN));
                if !worn {
                    return Err(CommandError::Rejected("no_armor_equipped"));
                }
                self.world.take_off_armor()
            }
            hand => self.world.unwield(hand),
        };
        result.map_err(delegated("unequip_failed"))?;
        Ok("unequipped=1".to_string())
    }

    pub(super) fn use_item(&mut self, args: &[String]) -> CommandResult {
        let id = self.carried(args, "use <item_id>")?.id;
        self.world.use_item(id).map_err(delegated("use_failed"))?;
        Ok("used=1".to_string())
    }

    pub(super) fn drop_item(&mut self, args: &[String]) -> CommandResult {
        let id = self.carried(args, "drop <item_id>")?.id;
        self.world.drop_item(id).map_err(delegated("drop_failed"))?;
        Ok("dropped=1".to_string())
    }

    /// Name and description of a map object or anything the player carries.
    pub(super) fn examine(&self, args: &[String]) -> CommandResult {
        if args.is_empty() {
            return Err(CommandError::Usage("examine <item_id>"));
        }
        let id = ObjectId(int_arg(args, 0, "invalid_item_id")?);
        let object = self
            .world
            .object(id)
            .or_else(|| self.world.player().and_then(|player| find_carried(player, id)))
            .ok_or(CommandError::Rejected("object_not_found"))?;
        Ok(format!(
            "name={}\ndescription={}\n",
            escape_value(&object.name),
            escape_value(&object.description)
        ))
    }
}
