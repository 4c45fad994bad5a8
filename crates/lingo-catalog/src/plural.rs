//! Plural rules for variant selection and validation.
//!
//! Each [`PluralRule`] maps an integer count to a [`PluralCategory`] and
//! fixes the **ordered** category list for its locale. The order matters:
//! a plural-sensitive message stores one translation variant per category,
//! in exactly this order, and the validator checks that the counts agree.
//!
//! # Invariants
//!
//! 1. `categorize(n)` always returns a member of `categories()`.
//! 2. `variant_index(n) < category_count()` for every `i64`.
//! 3. Rules are pure: same count, same category.
//!
//! The built-in table covers the language families present in the catalogs
//! this engine was built for; unknown languages get the two-category
//! English rule. Hosts with exotic needs supply [`PluralRule::Custom`].

use core::fmt;

use crate::locale::LocaleId;

/// CLDR-style plural categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl fmt::Display for PluralCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Zero => "zero",
            Self::One => "one",
            Self::Two => "two",
            Self::Few => "few",
            Self::Many => "many",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

const ENGLISH_CATEGORIES: &[PluralCategory] = &[PluralCategory::One, PluralCategory::Other];
const SLAVIC_CATEGORIES: &[PluralCategory] = &[
    PluralCategory::One,
    PluralCategory::Few,
    PluralCategory::Many,
];
const ARABIC_CATEGORIES: &[PluralCategory] = &[
    PluralCategory::Zero,
    PluralCategory::One,
    PluralCategory::Two,
    PluralCategory::Few,
    PluralCategory::Many,
    PluralCategory::Other,
];
const CJK_CATEGORIES: &[PluralCategory] = &[PluralCategory::Other];

/// A plural rule: count → category, plus the category order that defines
/// how plural variants are laid out in a catalog.
#[derive(Clone)]
pub enum PluralRule {
    /// `one` for 1, `other` otherwise. Two categories.
    English,
    /// `one` for 0 and 1, `other` otherwise. Two categories.
    French,
    /// Russian/Serbo-Croatian family: `one`/`few`/`many` by the last two
    /// digits. Three categories.
    Slavic,
    /// Polish: like Slavic but 1 is the only `one`. Three categories.
    Polish,
    /// Arabic: the full six-category scheme.
    Arabic,
    /// Chinese/Japanese/Korean and similar: no plural distinction.
    Cjk,
    /// Host-supplied rule with its own category order.
    Custom {
        categorize: fn(i64) -> PluralCategory,
        categories: &'static [PluralCategory],
    },
}

impl PluralRule {
    /// Pick the rule for a locale, keyed on the primary language subtag.
    /// Unknown languages fall back to [`PluralRule::English`].
    #[must_use]
    pub fn for_locale(locale: &LocaleId) -> Self {
        Self::for_language(locale.language())
    }

    /// Like [`PluralRule::for_locale`], for a bare language subtag.
    #[must_use]
    pub fn for_language(language: &str) -> Self {
        match language {
            "fr" | "pt" | "hi" | "bn" => Self::French,
            "ru" | "uk" | "be" | "hr" | "sr" | "bs" | "cs" | "sk" => Self::Slavic,
            "pl" => Self::Polish,
            "ar" => Self::Arabic,
            "zh" | "ja" | "ko" | "th" | "vi" | "id" | "ms" => Self::Cjk,
            _ => Self::English,
        }
    }

    /// Map a count to its plural category.
    #[must_use]
    pub fn categorize(&self, count: i64) -> PluralCategory {
        let n = count.unsigned_abs();
        match self {
            Self::English => {
                if n == 1 {
                    PluralCategory::One
                } else {
                    PluralCategory::Other
                }
            }
            Self::French => {
                if n <= 1 {
                    PluralCategory::One
                } else {
                    PluralCategory::Other
                }
            }
            Self::Slavic => slavic(n),
            Self::Polish => {
                if n == 1 {
                    PluralCategory::One
                } else {
                    slavic_few_many(n)
                }
            }
            Self::Arabic => arabic(n),
            Self::Cjk => PluralCategory::Other,
            Self::Custom { categorize, .. } => categorize(count),
        }
    }

    /// The ordered category list defining plural variant layout.
    #[must_use]
    pub fn categories(&self) -> &'static [PluralCategory] {
        match self {
            Self::English | Self::French => ENGLISH_CATEGORIES,
            Self::Slavic | Self::Polish => SLAVIC_CATEGORIES,
            Self::Arabic => ARABIC_CATEGORIES,
            Self::Cjk => CJK_CATEGORIES,
            Self::Custom { categories, .. } => categories,
        }
    }

    /// Number of plural variants a catalog of this locale must carry.
    #[must_use]
    pub fn category_count(&self) -> usize {
        self.categories().len()
    }

    /// Index of the variant to display for the given count.
    ///
    /// Always in range: a `Custom` rule that categorizes outside its own
    /// category list resolves to the last position.
    #[must_use]
    pub fn variant_index(&self, count: i64) -> usize {
        let category = self.categorize(count);
        let categories = self.categories();
        categories
            .iter()
            .position(|&c| c == category)
            .unwrap_or(categories.len().saturating_sub(1))
    }
}

impl fmt::Debug for PluralRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::English => "English",
            Self::French => "French",
            Self::Slavic => "Slavic",
            Self::Polish => "Polish",
            Self::Arabic => "Arabic",
            Self::Cjk => "Cjk",
            Self::Custom { .. } => "Custom(..)",
        };
        write!(f, "PluralRule::{name}")
    }
}

fn slavic(n: u64) -> PluralCategory {
    if n % 10 == 1 && n % 100 != 11 {
        PluralCategory::One
    } else {
        slavic_few_many(n)
    }
}

fn slavic_few_many(n: u64) -> PluralCategory {
    let mod10 = n % 10;
    let mod100 = n % 100;
    if (2..=4).contains(&mod10) && !(12..=14).contains(&mod100) {
        PluralCategory::Few
    } else {
        PluralCategory::Many
    }
}

fn arabic(n: u64) -> PluralCategory {
    let mod100 = n % 100;
    match n {
        0 => PluralCategory::Zero,
        1 => PluralCategory::One,
        2 => PluralCategory::Two,
        _ if (3..=10).contains(&mod100) => PluralCategory::Few,
        _ if (11..=99).contains(&mod100) => PluralCategory::Many,
        _ => PluralCategory::Other,
    }
}
