//! `DetectModerationLabels` response and the moderation category catalogs.

use super::Confidence;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetectModerationLabelsResponse {
    pub moderation_labels: Vec<ModerationLabel>,
    pub orientation_correction: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModerationLabel {
    pub name: String,
    /// Empty for top-level labels.
    pub parent_name: String,
    pub confidence: Confidence,
}

/// Granularity of the selected moderation categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryLevel {
    #[default]
    #[serde(alias = "top")]
    Top,
    #[serde(alias = "second")]
    Second,
}

macro_rules! category_catalog {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => ($key:literal, $display:literal)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Name the provider uses in `Name` / `ParentName`.
            pub fn display_name(&self) -> &'static str {
                match self {
                    $($name::$variant => $display),+
                }
            }

            /// Snake-case key, used in configuration and column names.
            pub fn key(&self) -> &'static str {
                match self {
                    $($name::$variant => $key),+
                }
            }
        }

        impl FromStr for $name {
            type Err = Error;

            /// Accepts the key, the display name, or the upper-case key, ignoring case.
            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|c| {
                        c.key().eq_ignore_ascii_case(wanted)
                            || c.display_name().eq_ignore_ascii_case(wanted)
                    })
                    .ok_or_else(|| {
                        Error::configuration(
                            "categories",
                            format!("unknown {} '{}'", stringify!($name), s),
                        )
                    })
            }
        }

        impl TryFrom<String> for $name {
            type Error = crate::Error;
            fn try_from(s: String) -> Result<Self> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(c: $name) -> String {
                c.key().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.display_name())
            }
        }
    };
}

category_catalog!(
    /// Top-level moderation categories.
    TopLevelCategory {
        ExplicitNudity => ("explicit_nudity", "Explicit Nudity"),
        Suggestive => ("suggestive", "Suggestive"),
        Violence => ("violence", "Violence"),
        VisuallyDisturbing => ("visually_disturbing", "Visually Disturbing"),
    }
);

category_catalog!(
    /// Second-level moderation categories.
    SecondLevelCategory {
        Nudity => ("nudity", "Nudity"),
        GraphicMaleNudity => ("graphic_male_nudity", "Graphic Male Nudity"),
        GraphicFemaleNudity => ("graphic_female_nudity", "Graphic Female Nudity"),
        SexualActivity => ("sexual_activity", "Sexual Activity"),
        IllustratedNudityOrSexualActivity => (
            "illustrated_nudity_or_sexual_activity",
            "Illustrated Nudity Or Sexual Activity"
        ),
        AdultToys => ("adult_toys", "Adult Toys"),
        FemaleSwimwearOrUnderwear => ("female_swimwear_or_underwear", "Female Swimwear Or Underwear"),
        MaleSwimwearOrUnderwear => ("male_swimwear_or_underwear", "Male Swimwear Or Underwear"),
        PartialNudity => ("partial_nudity", "Partial Nudity"),
        RevealingClothes => ("revealing_clothes", "Revealing Clothes"),
        GraphicViolenceOrGore => ("graphic_violence_or_gore", "Graphic Violence Or Gore"),
        PhysicalViolence => ("physical_violence", "Physical Violence"),
        WeaponViolence => ("weapon_violence", "Weapon Violence"),
        Weapons => ("weapons", "Weapons"),
        SelfInjury => ("self_injury", "Self Injury"),
        EmaciatedBodies => ("emaciated_bodies", "Emaciated Bodies"),
        Corpses => ("corpses", "Corpses"),
        Hanging => ("hanging", "Hanging"),
    }
);

/// A category selected at either level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModerationCategory {
    Top(TopLevelCategory),
    Second(SecondLevelCategory),
}

impl ModerationCategory {
    pub fn parse(level: CategoryLevel, s: &str) -> Result<Self> {
        Ok(match level {
            CategoryLevel::Top => Self::Top(s.parse()?),
            CategoryLevel::Second => Self::Second(s.parse()?),
        })
    }

    pub fn level(&self) -> CategoryLevel {
        match self {
            Self::Top(_) => CategoryLevel::Top,
            Self::Second(_) => CategoryLevel::Second,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Top(c) => c.display_name(),
            Self::Second(c) => c.display_name(),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Top(c) => c.key(),
            Self::Second(c) => c.key(),
        }
    }

    /// Top-level categories match on the label's parent, second-level ones on its name.
    pub fn matches(&self, label: &ModerationLabel) -> bool {
        match self {
            Self::Top(c) => label.parent_name == c.display_name(),
            Self::Second(c) => label.name == c.display_name(),
        }
    }

    /// Every category of a level, in catalog order.
    pub fn all(level: CategoryLevel) -> Vec<Self> {
        match level {
            CategoryLevel::Top => TopLevelCategory::ALL.iter().copied().map(Self::Top).collect(),
            CategoryLevel::Second => SecondLevelCategory::ALL
                .iter()
                .copied()
                .map(Self::Second)
                .collect(),
        }
    }
}

impl DetectModerationLabelsResponse {
    /// Highest-confidence label matching `category`.
    pub fn best_match(&self, category: &ModerationCategory) -> Option<&ModerationLabel> {
        self.moderation_labels
            .iter()
            .filter(|l| category.matches(l))
            .fold(None, |best: Option<&ModerationLabel>, l| match best {
                Some(b) if b.confidence.fraction() >= l.confidence.fraction() => Some(b),
                _ => Some(l),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_sizes() {
        assert_eq!(TopLevelCategory::ALL.len(), 4);
        assert_eq!(SecondLevelCategory::ALL.len(), 18);
    }

    #[test]
    fn test_category_parsing_is_lenient() {
        assert_eq!(
            "VIOLENCE".parse::<TopLevelCategory>().unwrap(),
            TopLevelCategory::Violence
        );
        assert_eq!(
            "Visually Disturbing".parse::<TopLevelCategory>().unwrap(),
            TopLevelCategory::VisuallyDisturbing
        );
        assert!("Violence".parse::<SecondLevelCategory>().is_err());
        let parsed: Vec<SecondLevelCategory> =
            serde_yaml::from_str("[weapons, SELF_INJURY]").unwrap();
        assert_eq!(
            parsed,
            vec![SecondLevelCategory::Weapons, SecondLevelCategory::SelfInjury]
        );
    }

    #[test]
    fn test_top_level_matches_parent_only() {
        let resp: DetectModerationLabelsResponse = serde_json::from_str(
            r#"{"ModerationLabels":[
                {"Name":"Violence","ParentName":"","Confidence":95},
                {"Name":"Weapons","ParentName":"Violence","Confidence":80},
                {"Name":"Weapon Violence","ParentName":"Violence","Confidence":60}
            ]}"#,
        )
        .unwrap();
        let top = ModerationCategory::Top(TopLevelCategory::Violence);
        assert_eq!(resp.best_match(&top).map(|l| l.name.as_str()), Some("Weapons"));

        let second = ModerationCategory::Second(SecondLevelCategory::WeaponViolence);
        assert_eq!(
            resp.best_match(&second).map(|l| l.confidence.percent()),
            Some(60.0)
        );
        let none = ModerationCategory::Top(TopLevelCategory::Suggestive);
        assert!(resp.best_match(&none).is_none());
    }
}
