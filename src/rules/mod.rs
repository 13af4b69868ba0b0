//! Environment rules for skipping cases and selecting legacy results
//!
//! Fixtures describe rules either as shorthand strings (`"1"`, `"<1.9.0"`,
//! `"1.8.0-1.9.0"`, `"2-master"`) or as tagged objects for composites and
//! build flags. Both forms parse into the closed [`Rule`] enum.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::BridgeError;

/// Numbered firmware release
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for Version {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BridgeError::Parse {
            message: format!("invalid firmware version: {}", s),
        };

        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<u32, BridgeError> {
            match parts.next() {
                Some(p) => p.parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };

        let major = next(true)?;
        let minor = next(true)?;
        let patch = next(false)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Version::new(major, minor, patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The environment a run is evaluated against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Firmware identifier as configured (`2-master`, `1.9.3`, ...)
    pub firmware: String,

    /// Device model, the leading digit of the identifier
    pub model: Option<u32>,

    /// Numbered release; `None` for symbolic builds such as `master` or `latest`
    pub version: Option<Version>,

    /// Build flags (`btc-only`, ...)
    pub flags: BTreeMap<String, String>,
}

impl Environment {
    pub fn from_firmware(firmware: &str) -> Self {
        let firmware = firmware.trim().to_string();
        let model = firmware
            .chars()
            .next()
            .and_then(|c| c.to_digit(10));
        let version = firmware.parse::<Version>().ok();

        Self {
            firmware,
            model,
            version,
            flags: BTreeMap::new(),
        }
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    /// Compares the running firmware against a release of the same model.
    ///
    /// Symbolic builds count as newer than every numbered release.
    /// Releases of another model are incomparable.
    fn compare(&self, other: &Version) -> Option<Ordering> {
        if self.model != Some(other.major) {
            return None;
        }
        match self.version {
            Some(v) => Some(v.cmp(other)),
            None => Some(Ordering::Greater),
        }
    }
}

/// Closed predicate over an [`Environment`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RuleRepr")]
pub enum Rule {
    /// Any firmware of the given model
    Model(u32),
    /// Exact firmware identifier
    Exact(String),
    /// Numbered release strictly older than the bound
    Below(Version),
    /// Release strictly newer than the bound
    Above(Version),
    /// Inclusive release range
    Range(Version, Version),
    /// Build flag equals value
    Flag { name: String, value: String },
    All(Vec<Rule>),
    Any(Vec<Rule>),
    Not(Box<Rule>),
}

impl Rule {
    pub fn matches(&self, env: &Environment) -> bool {
        match self {
            Rule::Model(model) => env.model == Some(*model),
            Rule::Exact(firmware) => env.firmware == *firmware,
            Rule::Below(bound) => env.compare(bound) == Some(Ordering::Less),
            Rule::Above(bound) => env.compare(bound) == Some(Ordering::Greater),
            Rule::Range(from, to) => {
                matches!(
                    env.compare(from),
                    Some(Ordering::Greater) | Some(Ordering::Equal)
                ) && matches!(
                    env.compare(to),
                    Some(Ordering::Less) | Some(Ordering::Equal)
                )
            }
            Rule::Flag { name, value } => env.flags.get(name) == Some(value),
            Rule::All(rules) => rules.iter().all(|r| r.matches(env)),
            Rule::Any(rules) => rules.iter().any(|r| r.matches(env)),
            Rule::Not(rule) => !rule.matches(env),
        }
    }
}

impl FromStr for Rule {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(BridgeError::Parse {
                message: "empty rule".to_string(),
            });
        }

        if let Some(bound) = s.strip_prefix('<') {
            return Ok(Rule::Below(bound.parse()?));
        }
        if let Some(bound) = s.strip_prefix('>') {
            return Ok(Rule::Above(bound.parse()?));
        }
        if let Some((from, to)) = s.split_once('-') {
            if let (Ok(from), Ok(to)) = (from.parse(), to.parse()) {
                return Ok(Rule::Range(from, to));
            }
        }
        if let Ok(model) = s.parse::<u32>() {
            return Ok(Rule::Model(model));
        }

        Ok(Rule::Exact(s.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleRepr {
    Shorthand(String),
    Tagged(TaggedRule),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedRule {
    Model { model: u32 },
    Exact { firmware: String },
    Below { version: String },
    Above { version: String },
    Range { from: String, to: String },
    Flag { name: String, value: String },
    All { rules: Vec<Rule> },
    Any { rules: Vec<Rule> },
    Not { rule: Box<Rule> },
}

impl TryFrom<RuleRepr> for Rule {
    type Error = BridgeError;

    fn try_from(repr: RuleRepr) -> Result<Self, Self::Error> {
        let tagged = match repr {
            RuleRepr::Shorthand(s) => return s.parse(),
            RuleRepr::Tagged(tagged) => tagged,
        };

        Ok(match tagged {
            TaggedRule::Model { model } => Rule::Model(model),
            TaggedRule::Exact { firmware } => Rule::Exact(firmware),
            TaggedRule::Below { version } => Rule::Below(version.parse()?),
            TaggedRule::Above { version } => Rule::Above(version.parse()?),
            TaggedRule::Range { from, to } => Rule::Range(from.parse()?, to.parse()?),
            TaggedRule::Flag { name, value } => Rule::Flag { name, value },
            TaggedRule::All { rules } => Rule::All(rules),
            TaggedRule::Any { rules } => Rule::Any(rules),
            TaggedRule::Not { rule } => Rule::Not(rule),
        })
    }
}

/// Rule list as written in fixtures: matches when any rule matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(pub Vec<Rule>);

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self(rules)
    }

    /// Parses shorthand rules, e.g. `RuleSet::parse(&["1", "<2.1.0"])`
    pub fn parse(rules: &[&str]) -> Result<Self, BridgeError> {
        rules
            .iter()
            .map(|r| r.parse())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn matches(&self, env: &Environment) -> bool {
        self.0.iter().any(|r| r.matches(env))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
