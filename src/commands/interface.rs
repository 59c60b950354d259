use super::{join_tokens, parse_int, CommandError, CommandResult, Interpreter};
use hexbridge_world::{EditorMode, Simulation};

pub(super) const KEY_TAB: i32 = 9;
pub(super) const KEY_RETURN: i32 = 13;
pub(super) const KEY_ESCAPE: i32 = 27;
pub(super) const KEY_B: i32 = b'b' as i32;
pub(super) const KEY_C: i32 = b'c' as i32;
pub(super) const KEY_E: i32 = b'e' as i32;
pub(super) const KEY_L: i32 = b'l' as i32;
pub(super) const KEY_N: i32 = b'n' as i32;
pub(super) const KEY_P: i32 = b'p' as i32;
const KEY_NAME_ENTRY: i32 = 517;
const MAX_NAME_CHARS: usize = 11;

const NAMED_KEYS: &[(&str, i32)] = &[
    ("enter", KEY_RETURN),
    ("return", KEY_RETURN),
    ("esc", KEY_ESCAPE),
    ("escape", KEY_ESCAPE),
    ("space", 32),
    ("tab", KEY_TAB),
    ("up", 328),
    ("down", 336),
    ("left", 331),
    ("right", 333),
    ("home", 327),
    ("end", 335),
    ("pgup", 329),
    ("pageup", 329),
    ("pgdown", 337),
    ("pagedown", 337),
];

/// Resolve a key argument: an integer code, a key name, or a single character.
pub fn parse_key(token: &str) -> Option<i32> {
    if let Some(code) = parse_int(token) {
        return (code >= 0).then_some(code);
    }
    let lower = token.to_ascii_lowercase();
    if let Some((_, code)) = NAMED_KEYS.iter().find(|(name, _)| *name == lower) {
        return Some(*code);
    }
    match token.as_bytes() {
        [byte] => Some(i32::from(*byte)),
        _ => None,
    }
}

impl<S: Simulation> Interpreter<S> {
    fn in_main_menu(&self) -> bool {
        self.world.interface().main_menu
    }

    pub(super) fn new_game(&mut self) -> CommandResult {
        if !self.in_main_menu() {
            return Err(CommandError::Rejected("new_game_available_only_in_main_menu"));
        }
        Ok(self.queue_key(KEY_N))
    }

    pub(super) fn load_game(&mut self) -> CommandResult {
        if !self.in_main_menu() {
            return Err(CommandError::Rejected("load_game_available_only_in_main_menu"));
        }
        Ok(self.queue_key(KEY_L))
    }

    pub(super) fn exit(&mut self) -> CommandResult {
        if self.in_main_menu() {
            self.world.queue_key(KEY_E);
        } else {
            self.world.request_quit();
        }
        Ok("quit_requested=1".to_string())
    }

    pub(super) fn key(&mut self, args: &[String]) -> CommandResult {
        let token = args.first().ok_or(CommandError::Usage("key <code|name>"))?;
        let code = parse_key(token).ok_or(CommandError::Rejected("invalid_key"))?;
        Ok(self.queue_key(code))
    }

    /// Type a character name into the name-entry box.
    pub(super) fn set_name(&mut self, args: &[String]) -> CommandResult {
        if args.is_empty() {
            return Err(CommandError::Usage("set_name <name>"));
        }
        let name = join_tokens(args);
        if name.trim().is_empty() {
            return Err(CommandError::Rejected("empty_name"));
        }
        self.world.queue_key(KEY_NAME_ENTRY);
        let mut sent = 0;
        for byte in name.bytes().filter(|b| (32..=126).contains(b)).take(MAX_NAME_CHARS) {
            self.world.queue_key(i32::from(byte));
            sent += 1;
        }
        self.world.queue_key(KEY_RETURN);
        Ok(format!("name_input_sent=1 chars={sent}"))
    }

    /// Confirm the character editor. Creation refuses while choices are left open.
    pub(super) fn done(&mut self) -> CommandResult {
        if self.world.interface().editor == Some(EditorMode::Creation) {
            let chargen = self.world.chargen();
            let over_limit = self.world.player_stats().special_over_limit();
            if chargen.character_points > 0 || chargen.tag_skills_remaining > 0 || over_limit {
                return Err(CommandError::Report(format!(
                    "done_ready=0\nremaining_character_points={}\nremaining_tag_skills={}\nspecial_over_10={}",
                    chargen.character_points,
                    chargen.tag_skills_remaining,
                    u8::from(over_limit)
                )));
            }
        }
        Ok(self.queue_key(KEY_RETURN))
    }
}
