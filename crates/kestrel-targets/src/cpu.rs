//! CPU catalog.
//!
//! Each architecture lists the processor models it accepts by name, with the
//! feature set each model enables by default. Names match the backend's own
//! CPU names so a resolved machine can be handed to LLVM unchanged.

/// A named processor model and its default features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuModel {
    /// CPU name (e.g., "x86-64-v3", "cortex-m4").
    pub name: &'static str,
    /// Features enabled by default; implied features are added on resolution.
    pub features: &'static [&'static str],
}

const X86_64_V2: &[&str] = &["sse4.2", "popcnt", "cx16"];
const X86_64_V3: &[&str] = &[
    "sse4.2", "popcnt", "cx16", "avx2", "fma", "bmi", "bmi2", "lzcnt", "movbe", "f16c", "xsave",
];
const X86_64_V4: &[&str] = &[
    "sse4.2", "popcnt", "cx16", "avx2", "fma", "bmi", "bmi2", "lzcnt", "movbe", "f16c", "xsave",
    "avx512f", "avx512bw", "avx512cd", "avx512dq", "avx512vl",
];

pub(crate) static X86_64_CPUS: &[CpuModel] = &[
    CpuModel {
        name: "x86-64",
        features: &["sse2"],
    },
    CpuModel {
        name: "x86-64-v2",
        features: X86_64_V2,
    },
    CpuModel {
        name: "x86-64-v3",
        features: X86_64_V3,
    },
    CpuModel {
        name: "x86-64-v4",
        features: X86_64_V4,
    },
    CpuModel {
        name: "haswell",
        features: &[
            "sse4.2", "popcnt", "cx16", "avx2", "fma", "bmi", "bmi2", "lzcnt", "movbe", "f16c",
            "xsave", "aes", "pclmul",
        ],
    },
    CpuModel {
        name: "skylake",
        features: &[
            "sse4.2", "popcnt", "cx16", "avx2", "fma", "bmi", "bmi2", "lzcnt", "movbe", "f16c",
            "xsave", "aes", "pclmul",
        ],
    },
    CpuModel {
        name: "skylake-avx512",
        features: &[
            "sse4.2", "popcnt", "cx16", "avx2", "fma", "bmi", "bmi2", "lzcnt", "movbe", "f16c",
            "xsave", "aes", "pclmul", "avx512f", "avx512bw", "avx512cd", "avx512dq", "avx512vl",
        ],
    },
    CpuModel {
        name: "znver3",
        features: &[
            "sse4.2", "popcnt", "cx16", "avx2", "fma", "bmi", "bmi2", "lzcnt", "movbe", "f16c",
            "xsave", "aes", "pclmul", "sha",
        ],
    },
];

pub(crate) static AARCH64_CPUS: &[CpuModel] = &[
    CpuModel {
        name: "generic",
        features: &["neon"],
    },
    CpuModel {
        name: "cortex-a53",
        features: &["neon", "crc"],
    },
    CpuModel {
        name: "cortex-a72",
        features: &["neon", "crc"],
    },
    CpuModel {
        name: "neoverse-n1",
        features: &[
            "neon", "crc", "lse", "rdm", "dotprod", "fullfp16", "rcpc", "aes", "sha2",
        ],
    },
    CpuModel {
        name: "neoverse-v1",
        features: &[
            "neon", "crc", "lse", "rdm", "dotprod", "fullfp16", "rcpc", "aes", "sha2", "sve",
        ],
    },
    CpuModel {
        name: "apple-m1",
        features: &[
            "neon", "crc", "lse", "rdm", "dotprod", "fullfp16", "rcpc", "aes", "sha2",
        ],
    },
];

pub(crate) static RISCV64_CPUS: &[CpuModel] = &[
    CpuModel {
        name: "generic-rv64",
        features: &[],
    },
    CpuModel {
        name: "sifive-u74",
        features: &["m", "a", "f", "d", "c"],
    },
    CpuModel {
        name: "sifive-x280",
        features: &["m", "a", "f", "d", "c", "v", "zba", "zbb"],
    },
];

pub(crate) static WASM32_CPUS: &[CpuModel] = &[
    CpuModel {
        name: "mvp",
        features: &[],
    },
    CpuModel {
        name: "generic",
        features: &["sign-ext", "mutable-globals"],
    },
    CpuModel {
        name: "bleeding-edge",
        features: &[
            "atomics",
            "bulk-memory",
            "mutable-globals",
            "nontrapping-fptoint",
            "sign-ext",
            "simd128",
            "tail-call",
        ],
    },
];

pub(crate) static THUMBV7EM_CPUS: &[CpuModel] = &[
    CpuModel {
        name: "generic",
        features: &["thumb2"],
    },
    CpuModel {
        name: "cortex-m4",
        features: &["thumb2", "dsp", "vfp4"],
    },
    CpuModel {
        name: "cortex-m7",
        features: &["thumb2", "dsp", "fp-armv8"],
    },
];
