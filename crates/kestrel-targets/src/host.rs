//! Host CPU detection.
//!
//! Used when a caller passes an empty, `native` or `host` CPU name. Detection
//! only applies when the requested architecture is the one this process runs
//! on; any other architecture falls back to its generic CPU.

use crate::arch::ArchInfo;
use crate::cpu::CpuModel;
use crate::features::FeatureSet;
use crate::triple::Triple;

/// CPU names that request host detection.
pub const HOST_SENTINELS: &[&str] = &["", "native", "host"];

/// Whether `cpu` asks for the host CPU.
pub fn is_host_sentinel(cpu: &str) -> bool {
    HOST_SENTINELS.contains(&cpu.trim())
}

/// Whether `arch` is the architecture of the running process.
pub fn is_host_arch(arch: &ArchInfo) -> bool {
    ArchInfo::for_arch(Triple::host().arch()).is_some_and(|host| host.name == arch.name)
}

/// Best CPU model and feature set for `arch` on this machine.
pub fn detect_cpu(arch: &'static ArchInfo) -> (&'static CpuModel, FeatureSet) {
    if is_host_arch(arch) {
        if let Some(detected) = detect_native(arch) {
            return detected;
        }
    }
    let cpu = arch.default_cpu_model();
    (cpu, FeatureSet::from_cpu(arch, cpu))
}

#[cfg(target_arch = "x86_64")]
fn detect_native(arch: &'static ArchInfo) -> Option<(&'static CpuModel, FeatureSet)> {
    macro_rules! probe {
        ($($detect:tt => $name:literal),* $(,)?) => {
            [$((std::arch::is_x86_feature_detected!($detect), $name)),*]
        };
    }

    let probes = probe![
        "sse" => "sse",
        "sse2" => "sse2",
        "sse3" => "sse3",
        "ssse3" => "ssse3",
        "sse4.1" => "sse4.1",
        "sse4.2" => "sse4.2",
        "popcnt" => "popcnt",
        "cmpxchg16b" => "cx16",
        "avx" => "avx",
        "avx2" => "avx2",
        "fma" => "fma",
        "bmi1" => "bmi",
        "bmi2" => "bmi2",
        "lzcnt" => "lzcnt",
        "f16c" => "f16c",
        "xsave" => "xsave",
        "aes" => "aes",
        "pclmulqdq" => "pclmul",
        "sha" => "sha",
        "avx512f" => "avx512f",
        "avx512bw" => "avx512bw",
        "avx512cd" => "avx512cd",
        "avx512dq" => "avx512dq",
        "avx512vl" => "avx512vl",
    ];

    let mut features = FeatureSet::default();
    for (present, name) in probes {
        if present {
            features.enable(arch, name);
        }
    }
    // Every AVX2+BMI2 part ships MOVBE.
    if features.contains("avx2") && features.contains("bmi2") {
        features.enable(arch, "movbe");
    }

    let cpu = ["x86-64-v4", "x86-64-v3", "x86-64-v2"]
        .iter()
        .filter_map(|name| arch.cpu(name))
        .find(|cpu| cpu.features.iter().all(|f| features.contains(f)))
        .unwrap_or_else(|| arch.default_cpu_model());
    Some((cpu, features))
}

#[cfg(target_arch = "aarch64")]
fn detect_native(arch: &'static ArchInfo) -> Option<(&'static CpuModel, FeatureSet)> {
    macro_rules! probe {
        ($($detect:tt => $name:literal),* $(,)?) => {
            [$((std::arch::is_aarch64_feature_detected!($detect), $name)),*]
        };
    }

    let probes = probe![
        "neon" => "neon",
        "crc" => "crc",
        "aes" => "aes",
        "sha2" => "sha2",
        "lse" => "lse",
        "rdm" => "rdm",
        "dotprod" => "dotprod",
        "fp16" => "fullfp16",
        "rcpc" => "rcpc",
        "sve" => "sve",
        "sve2" => "sve2",
    ];

    let mut features = FeatureSet::default();
    for (present, name) in probes {
        if present {
            features.enable(arch, name);
        }
    }

    let preferred = if cfg!(target_os = "macos") {
        arch.cpu("apple-m1")
    } else {
        None
    };
    let cpu = preferred.unwrap_or_else(|| arch.default_cpu_model());
    Some((cpu, features))
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn detect_native(_arch: &'static ArchInfo) -> Option<(&'static CpuModel, FeatureSet)> {
    None
}
