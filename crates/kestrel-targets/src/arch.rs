//! Architecture catalog.
//!
//! Describes, for every architecture the backend supports, its data layout,
//! pointer width, code models, known features (with implication edges) and
//! CPU models.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::cpu::{
    CpuModel, AARCH64_CPUS, RISCV64_CPUS, THUMBV7EM_CPUS, WASM32_CPUS, X86_64_CPUS,
};
use crate::options::CodeModel;
use crate::triple::{Arch, Os};

/// Byte ordering of the target architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endianness {
    Little,
    Big,
}

/// Static description of a supported architecture.
#[derive(Debug)]
pub struct ArchInfo {
    /// Canonical architecture name.
    pub name: &'static str,
    /// Pointer width in bits.
    pub pointer_width: u32,
    pub endianness: Endianness,
    pub default_code_model: CodeModel,
    /// Code models the backend accepts for this architecture.
    pub code_models: &'static [CodeModel],
    /// Every feature name a toggle may refer to.
    pub features: &'static [&'static str],
    /// `(feature, directly implied features)` edges.
    pub implies: &'static [(&'static str, &'static [&'static str])],
    pub cpus: &'static [CpuModel],
    /// CPU used when none is named and the host cannot be used.
    pub default_cpu: &'static str,
}

static X86_64: ArchInfo = ArchInfo {
    name: "x86_64",
    pointer_width: 64,
    endianness: Endianness::Little,
    default_code_model: CodeModel::Small,
    code_models: &[
        CodeModel::Small,
        CodeModel::Kernel,
        CodeModel::Medium,
        CodeModel::Large,
    ],
    features: &[
        "sse", "sse2", "sse3", "ssse3", "sse4.1", "sse4.2", "popcnt", "cx16", "avx", "avx2",
        "fma", "bmi", "bmi2", "lzcnt", "movbe", "f16c", "xsave", "aes", "pclmul", "sha",
        "avx512f", "avx512bw", "avx512cd", "avx512dq", "avx512vl",
    ],
    implies: &[
        ("sse2", &["sse"]),
        ("sse3", &["sse2"]),
        ("ssse3", &["sse3"]),
        ("sse4.1", &["ssse3"]),
        ("sse4.2", &["sse4.1"]),
        ("avx", &["sse4.2"]),
        ("avx2", &["avx"]),
        ("fma", &["avx"]),
        ("f16c", &["avx"]),
        ("aes", &["sse2"]),
        ("pclmul", &["sse2"]),
        ("sha", &["sse2"]),
        ("avx512f", &["avx2", "fma", "f16c"]),
        ("avx512bw", &["avx512f"]),
        ("avx512cd", &["avx512f"]),
        ("avx512dq", &["avx512f"]),
        ("avx512vl", &["avx512f"]),
    ],
    cpus: X86_64_CPUS,
    default_cpu: "x86-64",
};

static AARCH64: ArchInfo = ArchInfo {
    name: "aarch64",
    pointer_width: 64,
    endianness: Endianness::Little,
    default_code_model: CodeModel::Small,
    code_models: &[CodeModel::Tiny, CodeModel::Small, CodeModel::Large],
    features: &[
        "neon", "fp-armv8", "crc", "aes", "sha2", "lse", "rdm", "dotprod", "fullfp16", "rcpc",
        "sve", "sve2",
    ],
    implies: &[
        ("neon", &["fp-armv8"]),
        ("aes", &["neon"]),
        ("sha2", &["neon"]),
        ("rdm", &["neon"]),
        ("dotprod", &["neon"]),
        ("fullfp16", &["fp-armv8"]),
        ("sve", &["fullfp16"]),
        ("sve2", &["sve"]),
    ],
    cpus: AARCH64_CPUS,
    default_cpu: "generic",
};

static RISCV64: ArchInfo = ArchInfo {
    name: "riscv64",
    pointer_width: 64,
    endianness: Endianness::Little,
    default_code_model: CodeModel::Small,
    code_models: &[CodeModel::Small, CodeModel::Medium],
    features: &["m", "a", "f", "d", "c", "v", "zba", "zbb", "zbs"],
    implies: &[("d", &["f"]), ("v", &["d"])],
    cpus: RISCV64_CPUS,
    default_cpu: "generic-rv64",
};

static WASM32: ArchInfo = ArchInfo {
    name: "wasm32",
    pointer_width: 32,
    endianness: Endianness::Little,
    default_code_model: CodeModel::Small,
    code_models: &[CodeModel::Small],
    features: &[
        "simd128",
        "relaxed-simd",
        "bulk-memory",
        "sign-ext",
        "mutable-globals",
        "nontrapping-fptoint",
        "atomics",
        "multivalue",
        "reference-types",
        "exception-handling",
        "tail-call",
    ],
    implies: &[("relaxed-simd", &["simd128"])],
    cpus: WASM32_CPUS,
    default_cpu: "generic",
};

static THUMBV7EM: ArchInfo = ArchInfo {
    name: "thumbv7em",
    pointer_width: 32,
    endianness: Endianness::Little,
    default_code_model: CodeModel::Small,
    code_models: &[CodeModel::Small],
    features: &["thumb2", "dsp", "vfp2", "vfp3", "vfp4", "fp-armv8", "fp16"],
    implies: &[
        ("vfp3", &["vfp2"]),
        ("vfp4", &["vfp3", "fp16"]),
        ("fp-armv8", &["vfp4"]),
    ],
    cpus: THUMBV7EM_CPUS,
    default_cpu: "generic",
};

impl ArchInfo {
    /// Catalog entry for an architecture, `None` if unsupported.
    pub fn for_arch(arch: &Arch) -> Option<&'static ArchInfo> {
        match arch {
            Arch::X86_64 => Some(&X86_64),
            Arch::AArch64 => Some(&AARCH64),
            Arch::Riscv64 => Some(&RISCV64),
            Arch::Wasm32 => Some(&WASM32),
            Arch::ThumbV7em => Some(&THUMBV7EM),
            Arch::Other(_) => None,
        }
    }

    /// Every supported architecture, in a stable order.
    pub fn all() -> [&'static ArchInfo; 5] {
        [&X86_64, &AARCH64, &RISCV64, &WASM32, &THUMBV7EM]
    }

    /// Look up a CPU model by name.
    pub fn cpu(&self, name: &str) -> Option<&'static CpuModel> {
        self.cpus.iter().find(|c| c.name == name)
    }

    pub fn default_cpu_model(&self) -> &'static CpuModel {
        self.cpu(self.default_cpu).unwrap_or(&self.cpus[0])
    }

    /// Canonical `&'static` spelling of a known feature.
    pub fn feature(&self, name: &str) -> Option<&'static str> {
        self.features.iter().copied().find(|f| *f == name)
    }

    pub fn supports_code_model(&self, model: CodeModel) -> bool {
        self.code_models.contains(&model)
    }

    /// A feature together with everything it transitively implies.
    pub fn implied_closure(&self, feature: &str) -> BTreeSet<&'static str> {
        let mut closure = BTreeSet::new();
        let mut stack: Vec<&'static str> = self.feature(feature).into_iter().collect();
        while let Some(f) = stack.pop() {
            if closure.insert(f) {
                if let Some((_, implied)) = self.implies.iter().find(|(k, _)| *k == f) {
                    stack.extend(implied.iter().copied());
                }
            }
        }
        closure
    }

    /// Features whose implied closure contains `feature` (including itself).
    pub fn dependents(&self, feature: &str) -> BTreeSet<&'static str> {
        self.features
            .iter()
            .copied()
            .filter(|f| self.implied_closure(f).contains(feature))
            .collect()
    }

    /// Data layout string for this architecture on the given OS.
    pub fn data_layout(&self, os: &Os) -> &'static str {
        match (self.name, os) {
            ("x86_64", Os::Darwin) => {
                "e-m:o-p270:32:32-p271:32:32-p272:64:64-i64:64-i128:128-f80:128-n8:16:32:64-S128"
            }
            ("x86_64", Os::Windows) => {
                "e-m:w-p270:32:32-p271:32:32-p272:64:64-i64:64-i128:128-f80:128-n8:16:32:64-S128"
            }
            ("x86_64", _) => {
                "e-m:e-p270:32:32-p271:32:32-p272:64:64-i64:64-i128:128-f80:128-n8:16:32:64-S128"
            }
            ("aarch64", Os::Darwin) => "e-m:o-i64:64-i128:128-n32:64-S128",
            ("aarch64", Os::Windows) => "e-m:w-p:64:64-i32:32-i64:64-i128:128-n32:64-S128",
            ("aarch64", _) => "e-m:e-i8:8:32-i16:16:32-i64:64-i128:128-n32:64-S128",
            ("riscv64", _) => "e-m:e-p:64:64-i64:64-i128:128-n32:64-S128",
            ("wasm32", _) => "e-m:e-p:32:32-p10:8:8-p20:8:8-i64:64-n32:64-S128-ni:1:10:20",
            _ => "e-m:e-p:32:32-Fi8-i64:64-v128:64:128-a:0:32-n32-S64",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_arch_has_no_entry() {
        assert!(ArchInfo::for_arch(&Arch::Other("sparc64".into())).is_none());
        assert_eq!(ArchInfo::for_arch(&Arch::X86_64).unwrap().pointer_width, 64);
    }

    #[test]
    fn catalog_is_self_consistent() {
        for info in ArchInfo::all() {
            assert!(info.cpu(info.default_cpu).is_some(), "{}", info.name);
            assert!(info.supports_code_model(info.default_code_model));
            for cpu in info.cpus {
                for f in cpu.features {
                    assert!(info.feature(f).is_some(), "{} lists unknown {f}", cpu.name);
                }
            }
            for (f, implied) in info.implies {
                assert!(info.feature(f).is_some());
                assert!(implied.iter().all(|i| info.feature(i).is_some()));
            }
        }
    }

    #[test]
    fn implication_closure_is_transitive() {
        let x86 = ArchInfo::for_arch(&Arch::X86_64).unwrap();
        let closure = x86.implied_closure("avx2");
        for f in ["avx2", "avx", "sse4.2", "sse4.1", "ssse3", "sse3", "sse2", "sse"] {
            assert!(closure.contains(f), "missing {f}");
        }
        assert!(!closure.contains("fma"));
        assert!(x86.implied_closure("not-a-feature").is_empty());
    }

    #[test]
    fn dependents_of_base_feature() {
        let x86 = ArchInfo::for_arch(&Arch::X86_64).unwrap();
        let deps = x86.dependents("avx");
        assert!(deps.contains("avx"));
        assert!(deps.contains("avx2"));
        assert!(deps.contains("avx512vl"));
        assert!(!deps.contains("sse4.2"));
    }

    #[test]
    fn data_layout_mangling_follows_os() {
        let x86 = ArchInfo::for_arch(&Arch::X86_64).unwrap();
        assert!(x86.data_layout(&Os::Linux).starts_with("e-m:e"));
        assert!(x86.data_layout(&Os::Darwin).starts_with("e-m:o"));
        assert!(x86.data_layout(&Os::Windows).starts_with("e-m:w"));
    }
}
