//! Target triple parsing.
//!
//! A triple is parsed once into structured components and never mutated.
//! Unknown architecture or OS names are preserved as `Other(..)`: whether a
//! triple is *supported* is decided when a machine is built, not when parsing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};

/// Instruction set architecture component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    AArch64,
    Riscv64,
    Wasm32,
    /// ARMv7E-M in Thumb mode (Cortex-M4/M7).
    ThumbV7em,
    Other(String),
}

impl Arch {
    fn parse(s: &str) -> Self {
        match s {
            "x86_64" | "amd64" | "x86-64" => Arch::X86_64,
            "aarch64" | "arm64" => Arch::AArch64,
            "riscv64" | "riscv64gc" | "riscv64imac" => Arch::Riscv64,
            "wasm32" => Arch::Wasm32,
            "thumbv7em" => Arch::ThumbV7em,
            other => Arch::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::AArch64 => "aarch64",
            Arch::Riscv64 => "riscv64",
            Arch::Wasm32 => "wasm32",
            Arch::ThumbV7em => "thumbv7em",
            Arch::Other(s) => s,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating system component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Darwin,
    Windows,
    FreeBsd,
    Wasi,
    /// Bare metal.
    None,
    Unknown,
    Other(String),
}

impl Os {
    fn parse(s: &str) -> Self {
        match s {
            "linux" => Os::Linux,
            "darwin" | "macos" => Os::Darwin,
            s if s.starts_with("macosx") => Os::Darwin,
            "windows" | "win32" => Os::Windows,
            "freebsd" => Os::FreeBsd,
            "wasi" => Os::Wasi,
            "none" => Os::None,
            "unknown" => Os::Unknown,
            other => Os::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Windows => "windows",
            Os::FreeBsd => "freebsd",
            Os::Wasi => "wasi",
            Os::None => "none",
            Os::Unknown => "unknown",
            Os::Other(s) => s,
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ENVIRONMENTS: &[&str] = &[
    "gnu", "gnueabi", "gnueabihf", "musl", "msvc", "eabi", "eabihf", "android", "elf",
];

/// A parsed `arch-vendor-os[-environment]` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Triple {
    arch: Arch,
    vendor: String,
    os: Os,
    environment: Option<String>,
}

impl Triple {
    /// Parse a triple with 2 to 4 dash-separated components.
    ///
    /// - `arch-os` (`x86_64-linux`)
    /// - `arch-os-env` when the last component is a known environment (`thumbv7em-none-eabihf`)
    /// - `arch-vendor-os` (`aarch64-apple-darwin`)
    /// - `arch-vendor-os-env` (`x86_64-unknown-linux-gnu`)
    pub fn parse(input: &str) -> Result<Self> {
        let malformed = || TargetError::MalformedTriple {
            input: input.to_string(),
        };
        let parts: Vec<&str> = input.trim().split('-').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(malformed());
        }

        let arch = Arch::parse(parts[0]);
        let (vendor, os, environment) = match &parts[1..] {
            [os] => ("unknown", *os, None),
            [os, env] if ENVIRONMENTS.contains(env) => ("unknown", *os, Some(*env)),
            [vendor, os] => (*vendor, *os, None),
            [vendor, os, env] => (*vendor, *os, Some(*env)),
            _ => return Err(malformed()),
        };

        Ok(Self {
            arch,
            vendor: vendor.to_string(),
            os: Os::parse(os),
            environment: environment.map(str::to_string),
        })
    }

    /// The triple of the machine running this process.
    pub fn host() -> Self {
        let arch = Arch::parse(std::env::consts::ARCH);
        let (vendor, os, environment) = match std::env::consts::OS {
            "macos" => ("apple", Os::Darwin, None),
            "windows" => ("pc", Os::Windows, Some("msvc")),
            "linux" => ("unknown", Os::Linux, Some("gnu")),
            other => ("unknown", Os::parse(other), None),
        };
        Self {
            arch,
            vendor: vendor.to_string(),
            os,
            environment: environment.map(str::to_string),
        }
    }

    pub fn arch(&self) -> &Arch {
        &self.arch
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn os(&self) -> &Os {
        &self.os
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.arch, self.vendor, self.os)?;
        if let Some(env) = &self.environment {
            write!(f, "-{env}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Triple {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Triple {
    type Error = TargetError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Triple> for String {
    fn from(t: Triple) -> Self {
        t.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_components() {
        let t = Triple::parse("x86_64-unknown-linux-gnu").unwrap();
        assert_eq!(t.arch(), &Arch::X86_64);
        assert_eq!(t.vendor(), "unknown");
        assert_eq!(t.os(), &Os::Linux);
        assert_eq!(t.environment(), Some("gnu"));
        assert_eq!(t.to_string(), "x86_64-unknown-linux-gnu");
    }

    #[test]
    fn vendor_os_form() {
        let t = Triple::parse("aarch64-apple-darwin").unwrap();
        assert_eq!(t.arch(), &Arch::AArch64);
        assert_eq!(t.vendor(), "apple");
        assert_eq!(t.os(), &Os::Darwin);
        assert!(t.environment().is_none());
    }

    #[test]
    fn os_env_form() {
        let t = Triple::parse("thumbv7em-none-eabihf").unwrap();
        assert_eq!(t.arch(), &Arch::ThumbV7em);
        assert_eq!(t.os(), &Os::None);
        assert_eq!(t.environment(), Some("eabihf"));
        assert_eq!(t.to_string(), "thumbv7em-unknown-none-eabihf");
    }

    #[test]
    fn aliases_canonicalised() {
        assert_eq!(Triple::parse("arm64-apple-macosx14.0").unwrap().arch(), &Arch::AArch64);
        assert_eq!(
            Triple::parse("amd64-linux").unwrap().to_string(),
            "x86_64-unknown-linux"
        );
    }

    #[test]
    fn unknown_arch_preserved() {
        let t = Triple::parse("sparc64-unknown-linux-gnu").unwrap();
        assert_eq!(t.arch(), &Arch::Other("sparc64".into()));
    }

    #[test]
    fn malformed_rejected() {
        for input in ["", "x86_64", "x86_64--linux", "a-b-c-d-e"] {
            assert!(
                matches!(Triple::parse(input), Err(TargetError::MalformedTriple { .. })),
                "{input} should be malformed"
            );
        }
    }

    #[test]
    fn host_triple_is_parseable() {
        let host = Triple::host();
        let reparsed = Triple::parse(&host.to_string()).unwrap();
        assert_eq!(host, reparsed);
    }
}
