//! Feature-string parsing and resolution.
//!
//! A feature string is a list of toggles (`+avx2,-sse4.2`, `+neon+crc`,
//! `avx2`). Resolution starts from a CPU's default features and applies the
//! toggles in order, following the architecture's implication table.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arch::ArchInfo;
use crate::cpu::CpuModel;
use crate::error::{Result, TargetError};

/// One parsed `+name` / `-name` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toggle {
    pub name: String,
    pub enable: bool,
}

/// Split a feature string into toggles.
///
/// Tokens are separated by commas; a `+` also opens a new token. `-` is only
/// a prefix at the start of a token because names like `fp-armv8` contain it.
pub fn parse_toggles(features: &str) -> Result<Vec<Toggle>> {
    let features = features.trim();
    if features.is_empty() {
        return Ok(Vec::new());
    }

    let mut toggles = Vec::new();
    for chunk in features.split(',') {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            return Err(TargetError::MalformedFeature {
                token: String::new(),
            });
        }
        for token in split_plus(chunk) {
            toggles.push(parse_token(token)?);
        }
    }
    Ok(toggles)
}

fn split_plus(chunk: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (i, c) in chunk.char_indices() {
        if c == '+' && i > start {
            tokens.push(&chunk[start..i]);
            start = i;
        }
    }
    tokens.push(&chunk[start..]);
    tokens
}

fn parse_token(token: &str) -> Result<Toggle> {
    let (enable, name) = match token.as_bytes().first() {
        Some(b'+') => (true, &token[1..]),
        Some(b'-') => (false, &token[1..]),
        _ => (true, token),
    };
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
        && !name.starts_with('-');
    if !valid {
        return Err(TargetError::MalformedFeature {
            token: token.to_string(),
        });
    }
    Ok(Toggle {
        name: name.to_string(),
        enable,
    })
}

/// A canonical, sorted set of enabled features.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    features: BTreeSet<String>,
}

impl FeatureSet {
    /// A CPU's default features closed under implication.
    pub fn from_cpu(arch: &ArchInfo, cpu: &CpuModel) -> Self {
        let mut set = Self::default();
        for f in cpu.features {
            set.enable(arch, f);
        }
        set
    }

    /// Apply `features` on top of the CPU defaults.
    ///
    /// Unknown names are an error, never silently dropped.
    pub fn resolve(arch: &ArchInfo, cpu: &CpuModel, features: &str) -> Result<Self> {
        Self::from_cpu(arch, cpu).with_toggles(arch, cpu.name, features)
    }

    /// Apply `features` on top of this set.
    pub fn with_toggles(mut self, arch: &ArchInfo, cpu: &str, features: &str) -> Result<Self> {
        for toggle in parse_toggles(features)? {
            if arch.feature(&toggle.name).is_none() {
                return Err(TargetError::UnknownFeature {
                    feature: toggle.name,
                    cpu: cpu.to_string(),
                    arch: arch.name.to_string(),
                });
            }
            if toggle.enable {
                self.enable(arch, &toggle.name);
            } else {
                self.disable(arch, &toggle.name);
            }
        }
        Ok(self)
    }

    /// Enable a feature and everything it implies.
    pub fn enable(&mut self, arch: &ArchInfo, feature: &str) {
        self.features
            .extend(arch.implied_closure(feature).into_iter().map(str::to_string));
    }

    /// Disable a feature and everything that implies it.
    pub fn disable(&mut self, arch: &ArchInfo, feature: &str) {
        for f in arch.dependents(feature) {
            self.features.remove(f);
        }
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Backend feature string: `+a,+b,...` in sorted order.
    pub fn render(&self) -> String {
        self.iter()
            .map(|f| format!("+{f}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
