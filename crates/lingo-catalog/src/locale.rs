//! Locale identifiers.
//!
//! A [`LocaleId`] is a parsed `language[-Script][_REGION]` tag. Parsing
//! accepts both `-` and `_` separators plus the POSIX `.codeset` and
//! `@modifier` suffixes found in environment variables and legacy catalog
//! headers (`de_DE.UTF-8@euro` parses as `de_DE`).
//!
//! Subtags are case-normalized on parse: language lowercase, script title
//! case, region uppercase. Display uses the underscore convention of the
//! catalog files themselves (`fr_CA`, `sr_Latn_RS`).

use std::fmt;
use std::str::FromStr;

/// Error produced when a locale tag cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleError {
    tag: String,
}

impl LocaleError {
    /// The offending tag, verbatim.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for LocaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid locale tag: {:?}", self.tag)
    }
}

impl std::error::Error for LocaleError {}

/// A parsed locale identifier: language plus optional script and region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocaleId {
    language: String,
    script: Option<String>,
    region: Option<String>,
}

impl LocaleId {
    /// Construct from pre-validated parts. Prefer [`LocaleId::parse`] for
    /// untrusted input.
    #[must_use]
    pub fn new(
        language: impl Into<String>,
        script: Option<String>,
        region: Option<String>,
    ) -> Self {
        Self {
            language: language.into(),
            script,
            region,
        }
    }

    /// Parse a locale tag.
    ///
    /// # Errors
    ///
    /// Returns [`LocaleError`] when the tag is empty or its subtags do not
    /// look like a language / script / region sequence.
    pub fn parse(tag: &str) -> Result<Self, LocaleError> {
        let err = || LocaleError {
            tag: tag.to_string(),
        };

        // Strip POSIX codeset and modifier suffixes.
        let bare = tag.split(['.', '@']).next().unwrap_or("").trim();
        if bare.is_empty() {
            return Err(err());
        }

        let mut parts = bare.split(['-', '_']);
        let language = parts.next().ok_or_else(err)?;
        if !(2..=3).contains(&language.len()) || !language.bytes().all(|b| b.is_ascii_alphabetic())
        {
            return Err(err());
        }

        let mut script = None;
        let mut region = None;
        for part in parts {
            if part.len() == 4 && part.bytes().all(|b| b.is_ascii_alphabetic()) {
                if script.is_some() || region.is_some() {
                    return Err(err());
                }
                let mut s = part.to_ascii_lowercase();
                s[..1].make_ascii_uppercase();
                script = Some(s);
            } else if (2..=3).contains(&part.len())
                && part.bytes().all(|b| b.is_ascii_alphanumeric())
            {
                if region.is_some() {
                    return Err(err());
                }
                region = Some(part.to_ascii_uppercase());
            } else {
                return Err(err());
            }
        }

        Ok(Self {
            language: language.to_ascii_lowercase(),
            script,
            region,
        })
    }

    /// Primary language subtag, lowercase (e.g. `"fr"`).
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Script subtag, title case (e.g. `"Latn"`).
    #[must_use]
    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    /// Region subtag, uppercase (e.g. `"CA"`).
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// The next-less-specific identifier: strips region first, then script.
    ///
    /// Returns `None` once only the language remains — the step after that
    /// is the root (source) catalog, which has no identifier.
    #[must_use]
    pub fn parent(&self) -> Option<LocaleId> {
        if self.region.is_some() {
            Some(Self {
                language: self.language.clone(),
                script: self.script.clone(),
                region: None,
            })
        } else if self.script.is_some() {
            Some(Self {
                language: self.language.clone(),
                script: None,
                region: None,
            })
        } else {
            None
        }
    }
}

impl FromStr for LocaleId {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LocaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.language)?;
        if let Some(script) = &self.script {
            write!(f, "_{script}")?;
        }
        if let Some(region) = &self.region {
            write!(f, "_{region}")?;
        }
        Ok(())
    }
}
