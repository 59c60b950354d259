//! Character tables: SPECIAL stats, skills, traits and aimed-shot locations.

use serde::{Deserialize, Serialize};

/// Lowercase the ASCII alphanumerics of `value` and drop everything else.
pub fn normalize_name(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

/// The seven primary stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialStat {
    /// Strength.
    Strength,
    /// Perception.
    Perception,
    /// Endurance.
    Endurance,
    /// Charisma.
    Charisma,
    /// Intelligence.
    Intelligence,
    /// Agility.
    Agility,
    /// Luck.
    Luck,
}

impl SpecialStat {
    /// All stats in sheet order.
    pub const ALL: [SpecialStat; 7] = [
        SpecialStat::Strength,
        SpecialStat::Perception,
        SpecialStat::Endurance,
        SpecialStat::Charisma,
        SpecialStat::Intelligence,
        SpecialStat::Agility,
        SpecialStat::Luck,
    ];

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            SpecialStat::Strength => "Strength",
            SpecialStat::Perception => "Perception",
            SpecialStat::Endurance => "Endurance",
            SpecialStat::Charisma => "Charisma",
            SpecialStat::Intelligence => "Intelligence",
            SpecialStat::Agility => "Agility",
            SpecialStat::Luck => "Luck",
        }
    }

    /// Snapshot key.
    pub fn key(self) -> &'static str {
        match self {
            SpecialStat::Strength => "strength",
            SpecialStat::Perception => "perception",
            SpecialStat::Endurance => "endurance",
            SpecialStat::Charisma => "charisma",
            SpecialStat::Intelligence => "intelligence",
            SpecialStat::Agility => "agility",
            SpecialStat::Luck => "luck",
        }
    }

    /// Index into a `[i32; 7]` stat block.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Accepts full names and three-letter abbreviations.
    pub fn from_name(value: &str) -> Option<Self> {
        let stat = match normalize_name(value).as_str() {
            "str" | "strength" => SpecialStat::Strength,
            "per" | "perception" => SpecialStat::Perception,
            "end" | "endurance" => SpecialStat::Endurance,
            "cha" | "charisma" => SpecialStat::Charisma,
            "int" | "intelligence" => SpecialStat::Intelligence,
            "agi" | "agility" => SpecialStat::Agility,
            "luk" | "luck" => SpecialStat::Luck,
            _ => return None,
        };
        Some(stat)
    }
}

macro_rules! named_table {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[allow(missing_docs)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every entry in table order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Display name.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Table index.
            pub fn index(self) -> usize {
                self as usize
            }

            /// Entry at `index`, if in range.
            pub fn from_index(index: usize) -> Option<Self> {
                Self::ALL.get(index).copied()
            }

            /// Match a display name, ignoring case, spacing and punctuation.
            pub fn from_name(value: &str) -> Option<Self> {
                let wanted = normalize_name(value);
                Self::ALL
                    .iter()
                    .copied()
                    .find(|entry| normalize_name(entry.name()) == wanted)
            }
        }
    };
}

named_table! {
    /// The eighteen skills.
    Skill {
        SmallGuns => "Small Guns",
        BigGuns => "Big Guns",
        EnergyWeapons => "Energy Weapons",
        Unarmed => "Unarmed",
        MeleeWeapons => "Melee Weapons",
        Throwing => "Throwing",
        FirstAid => "First Aid",
        Doctor => "Doctor",
        Sneak => "Sneak",
        Lockpick => "Lockpick",
        Steal => "Steal",
        Traps => "Traps",
        Science => "Science",
        Repair => "Repair",
        Speech => "Speech",
        Barter => "Barter",
        Gambling => "Gambling",
        Outdoorsman => "Outdoorsman",
    }
}

named_table! {
    /// The sixteen optional traits.
    Trait {
        FastMetabolism => "Fast Metabolism",
        Bruiser => "Bruiser",
        SmallFrame => "Small Frame",
        OneHander => "One Hander",
        Finesse => "Finesse",
        Kamikaze => "Kamikaze",
        HeavyHanded => "Heavy Handed",
        FastShot => "Fast Shot",
        BloodyMess => "Bloody Mess",
        Jinxed => "Jinxed",
        GoodNatured => "Good Natured",
        ChemReliant => "Chem Reliant",
        ChemResistant => "Chem Resistant",
        NightPerson => "Night Person",
        Skilled => "Skilled",
        Gifted => "Gifted",
    }
}

named_table! {
    /// Aimed-shot body locations.
    HitLocation {
        Head => "head",
        LeftArm => "left_arm",
        RightArm => "right_arm",
        Torso => "torso",
        RightLeg => "right_leg",
        LeftLeg => "left_leg",
        Eyes => "eyes",
        Groin => "groin",
    }
}

impl HitLocation {
    /// Parse a body part, including the short aliases (`larm`, `rleg`, `body`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        let location = match normalize_name(value).as_str() {
            "head" => HitLocation::Head,
            "leftarm" | "larm" => HitLocation::LeftArm,
            "rightarm" | "rarm" => HitLocation::RightArm,
            "torso" | "body" => HitLocation::Torso,
            "rightleg" | "rleg" => HitLocation::RightLeg,
            "leftleg" | "lleg" => HitLocation::LeftLeg,
            "eyes" | "eye" => HitLocation::Eyes,
            "groin" => HitLocation::Groin,
            _ => return None,
        };
        Some(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_names_ignore_case_and_spacing() {
        assert_eq!(Skill::from_name("small guns"), Some(Skill::SmallGuns));
        assert_eq!(Skill::from_name("FIRST-AID"), Some(Skill::FirstAid));
        assert_eq!(Skill::from_name("lockpicks"), None);
        assert_eq!(Skill::ALL.len(), 18);
    }

    #[test]
    fn trait_table_has_sixteen_entries() {
        assert_eq!(Trait::ALL.len(), 16);
        assert_eq!(Trait::from_index(15), Some(Trait::Gifted));
        assert_eq!(Trait::from_name("chem resistant"), Some(Trait::ChemResistant));
    }

    #[test]
    fn special_accepts_abbreviations() {
        assert_eq!(SpecialStat::from_name("LUK"), Some(SpecialStat::Luck));
        assert_eq!(SpecialStat::from_name("per"), Some(SpecialStat::Perception));
        assert_eq!(SpecialStat::from_name("wis"), None);
    }

    #[test]
    fn hit_location_aliases() {
        assert_eq!(HitLocation::parse("LArm"), Some(HitLocation::LeftArm));
        assert_eq!(HitLocation::parse("body"), Some(HitLocation::Torso));
        assert_eq!(HitLocation::parse("eye"), Some(HitLocation::Eyes));
        assert_eq!(HitLocation::parse("tail"), None);
    }
}
