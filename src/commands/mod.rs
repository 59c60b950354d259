//! Line-command interpreter: tokenizing, verb dispatch and the ok/error envelope.

mod actions;
mod chargen;
mod combat;
mod dialogue;
mod interface;
mod inventory;
mod movement;
mod report;
mod worldmap;

use crate::classifier::KeywordClassifier;
use crate::config::BridgeConfig;
use crate::look::LookClassifier;
use crate::navigation::NavError;
use hexbridge_core::{ObjectId, WorldObject};
use hexbridge_world::Simulation;
use thiserror::Error;

/// Outcome of one command. `ok == false` is a recoverable failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub ok: bool,
    pub body: String,
}

/// Command failures. `Display` is the response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty_command")]
    Empty,
    #[error("unknown_command")]
    Unknown,
    #[error("usage={0}")]
    Usage(&'static str),
    #[error("player_unavailable")]
    PlayerUnavailable,
    /// Validation or mode precondition failed.
    #[error("{0}")]
    Rejected(&'static str),
    /// The simulation refused a delegated action.
    #[error("{0}")]
    Failed(&'static str),
    /// Multi-line error body.
    #[error("{0}")]
    Report(String),
    #[error(transparent)]
    Nav(#[from] NavError),
}

pub type CommandResult = Result<String, CommandError>;

/// Map a collaborator error onto a `*_failed` token, logging the cause.
fn delegated(token: &'static str) -> impl FnOnce(anyhow::Error) -> CommandError {
    move |err| {
        tracing::debug!(%token, err = %format!("{err:#}"), "delegated action failed");
        CommandError::Failed(token)
    }
}

macro_rules! verbs {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Every command the interpreter accepts.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Verb {
            $($variant),+
        }

        impl Verb {
            pub const ALL: &'static [Verb] = &[$(Verb::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Verb::$variant => $name),+
                }
            }
        }
    };
}

verbs! {
    Help => "help",
    State => "state",
    Look => "look",
    DebugObjects => "debug_objects",
    DebugNearby => "debug_nearby",
    NewGame => "new_game",
    LoadGame => "load_game",
    Exit => "exit",
    Key => "key",
    StatInc => "stat_inc",
    StatDec => "stat_dec",
    TagSkill => "tag_skill",
    TraitSelect => "trait_select",
    SetName => "set_name",
    Done => "done",
    Move => "move",
    MoveTo => "move_to",
    Goto => "goto",
    Enter => "enter",
    ScanExits => "scan_exits",
    Interact => "interact",
    Talk => "talk",
    Pickup => "pickup",
    UseSkill => "use_skill",
    Wait => "wait",
    Attack => "attack",
    EndTurn => "end_turn",
    Reload => "reload",
    ChangeWeapon => "change_weapon",
    Flee => "flee",
    Say => "say",
    Barter => "barter",
    End => "end",
    Inventory => "inventory",
    Equip => "equip",
    Unequip => "unequip",
    Use => "use",
    Drop => "drop",
    Examine => "examine",
    Worldmap => "worldmap",
    Travel => "travel",
    Cancel => "cancel",
    Save => "save",
    Pipboy => "pipboy",
    Character => "character",
    Automap => "automap",
    Sneak => "sneak",
}

impl Verb {
    /// Case-insensitive lookup.
    pub fn parse(token: &str) -> Option<Self> {
        let lower = token.to_ascii_lowercase();
        Self::ALL.iter().copied().find(|verb| verb.as_str() == lower)
    }
}

pub const HELP_TEXT: &str = "Commands:\n\
state | look | help | debug_objects | debug_nearby\n\
new_game | load_game | exit\n\
key <code|name>\n\
stat_inc <stat> | stat_dec <stat>\n\
tag_skill <skill_name> | trait_select <trait_name_or_index> | set_name <name> | done\n\
move <direction> | move_to <tile> | goto <object_id_or_tile> | enter | scan_exits\n\
interact <object_id> | talk <npc_id> | pickup <object_id>\n\
use_skill <skill_name> <target_id> | wait <hours>\n\
attack <target_id> [body_part] | end_turn | reload | change_weapon | flee\n\
say <option_number> | barter | end\n\
inventory | equip <item_id> <slot> | unequip <slot> | use <item_id> | drop <item_id> | examine <item_id>\n\
worldmap | travel <location_name> | cancel\n\
save <slot> | pipboy | character | automap | sneak";

/// Split a command line on whitespace, honouring `'...'` and `"..."` spans.
///
/// Quotes are stripped and do not nest; the other quote character is literal inside a span.
/// An unterminated quote runs to the end of the line. Empty tokens are dropped.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut token = String::new();
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        if ch == '\'' || ch == '"' {
            match quote {
                Some(open) if open == ch => {
                    quote = None;
                    continue;
                }
                None => {
                    quote = Some(ch);
                    continue;
                }
                Some(_) => {}
            }
        }
        if quote.is_none() && ch.is_whitespace() {
            if !token.is_empty() {
                tokens.push(std::mem::take(&mut token));
            }
            continue;
        }
        token.push(ch);
    }
    if !token.is_empty() {
        tokens.push(token);
    }
    tokens
}

/// Join tokens with single spaces.
pub fn join_tokens(tokens: &[String]) -> String {
    tokens.join(" ")
}

/// Parse an integer the way C `strtol` does with base 0, requiring the whole token.
///
/// Accepts an optional sign, `0x`/`0X` hexadecimal and leading-zero octal. The value must fit
/// in an `i32`.
pub fn parse_int(token: &str) -> Option<i32> {
    let text = token.trim_start();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = if let Some(hex) = rest
        .strip_prefix("0x")
        .or_else(|| rest.strip_prefix("0X"))
        .filter(|hex| hex.chars().next().is_some_and(|ch| ch.is_ascii_hexdigit()))
    {
        (16, hex)
    } else if rest.len() > 1 && rest.starts_with('0') {
        (8, &rest[1..])
    } else {
        (10, rest)
    };
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_digit(radix)) {
        return None;
    }
    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).ok()
}

/// Executes command lines against a simulation.
pub struct Interpreter<S> {
    world: S,
    config: BridgeConfig,
    look: LookClassifier,
    dialogue_end: KeywordClassifier,
}

impl<S: Simulation> Interpreter<S> {
    pub fn new(world: S, config: BridgeConfig) -> Self {
        let look = LookClassifier::new(&config.look);
        let dialogue_end = KeywordClassifier::including(&config.dialogue.end_keywords);
        Self {
            world,
            config,
            look,
            dialogue_end,
        }
    }

    pub fn world(&self) -> &S {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut S {
        &mut self.world
    }

    /// Run one command line. Returns the response label (lowercase verb token) and the result.
    pub fn execute(&mut self, line: &str) -> (String, CommandResponse) {
        let tokens = tokenize(line);
        let label = tokens
            .first()
            .map(|verb| verb.to_ascii_lowercase())
            .unwrap_or_default();

        let result = match tokens.split_first() {
            None => Err(CommandError::Empty),
            Some((verb, args)) => match Verb::parse(verb) {
                Some(verb) => self.dispatch(verb, args),
                None => Err(CommandError::Unknown),
            },
        };

        let response = match result {
            Ok(body) => CommandResponse { ok: true, body },
            Err(err) => CommandResponse {
                ok: false,
                body: err.to_string(),
            },
        };
        tracing::debug!(verb = %label, ok = response.ok, "command executed");
        (label, response)
    }

    fn dispatch(&mut self, verb: Verb, args: &[String]) -> CommandResult {
        match verb {
            Verb::Help => Ok(HELP_TEXT.to_string()),
            Verb::State => self.state(),
            Verb::Look => self.look(),
            Verb::DebugObjects => self.debug_objects(),
            Verb::DebugNearby => self.debug_nearby(),
            Verb::NewGame => self.new_game(),
            Verb::LoadGame => self.load_game(),
            Verb::Exit => self.exit(),
            Verb::Key => self.key(args),
            Verb::StatInc => self.stat_change(args, 1),
            Verb::StatDec => self.stat_change(args, -1),
            Verb::TagSkill => self.tag_skill(args),
            Verb::TraitSelect => self.trait_select(args),
            Verb::SetName => self.set_name(args),
            Verb::Done => self.done(),
            Verb::Move => self.step(args),
            Verb::MoveTo => self.move_to(args),
            Verb::Goto => self.goto(args),
            Verb::Enter => self.enter(),
            Verb::ScanExits => self.scan_exits(),
            Verb::Interact | Verb::Talk | Verb::Pickup => self.object_action(verb, args),
            Verb::UseSkill => self.use_skill(args),
            Verb::Wait => self.wait(args),
            Verb::Attack => self.attack(args),
            Verb::EndTurn => self.end_turn(),
            Verb::Reload => self.reload(),
            Verb::ChangeWeapon => self.change_weapon(),
            Verb::Flee => self.flee(),
            Verb::Say => self.say(args),
            Verb::Barter => self.barter(),
            Verb::End => self.end_dialogue(),
            Verb::Inventory => self.inventory(),
            Verb::Equip => self.equip(args),
            Verb::Unequip => self.unequip(args),
            Verb::Use => self.use_item(args),
            Verb::Drop => self.drop_item(args),
            Verb::Examine => self.examine(args),
            Verb::Worldmap => self.worldmap(),
            Verb::Travel => self.travel(args),
            Verb::Cancel => self.cancel(),
            Verb::Save => self.save(args),
            Verb::Pipboy => Ok(self.queue_key(interface::KEY_P)),
            Verb::Character => Ok(self.queue_key(interface::KEY_C)),
            Verb::Automap => Ok(self.queue_key(interface::KEY_TAB)),
            Verb::Sneak => self.sneak(),
        }
    }

    fn player(&self) -> Result<&WorldObject, CommandError> {
        self.world.player().ok_or(CommandError::PlayerUnavailable)
    }

    fn player_id(&self) -> Result<ObjectId, CommandError> {
        self.player().map(|player| player.id)
    }

    /// Action points a move may spend: the player's combat AP in combat, unlimited otherwise.
    fn move_points(&self) -> Option<i32> {
        self.world.combat()?;
        self.world.player()?.critter().map(|critter| critter.ap)
    }

    fn queue_key(&mut self, code: i32) -> String {
        self.world.queue_key(code);
        format!("queued_key={code}")
    }
}

/// Parse the first argument as an integer, mapping a missing or bad token to `invalid`.
fn int_arg(args: &[String], index: usize, invalid: &'static str) -> Result<i32, CommandError> {
    args.get(index)
        .and_then(|token| parse_int(token))
        .ok_or(CommandError::Rejected(invalid))
}
