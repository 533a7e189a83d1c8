//! LLVM target-machine bridge.
//!
//! Turns a resolved [`TargetMachine`] into an `inkwell` target machine with
//! the same triple, CPU, features, relocation model and code model. The
//! frame-pointer policy travels as a function attribute instead. FP
//! contraction and float ABI are not bridged: the LLVM C API exposes no
//! target options for them.

use inkwell::attributes::AttributeLoc;
use inkwell::module::Module;
use inkwell::targets::{
    CodeModel as LlvmCodeModel, InitializationConfig, RelocMode, Target, TargetTriple,
};
use inkwell::OptimizationLevel;

use crate::error::{Result, TargetError};
use crate::machine::{TargetMachine, FRAME_POINTER_ATTR, TARGET_CPU_ATTR, TARGET_FEATURES_ATTR};
use crate::options::{CodeModel, FramePointer, RelocModel};
use crate::triple::Arch;

/// Register the LLVM backend for `arch`.
pub fn initialize_target(arch: &Arch) {
    let config = InitializationConfig::default();
    match arch {
        Arch::X86_64 => Target::initialize_x86(&config),
        Arch::AArch64 => Target::initialize_aarch64(&config),
        Arch::Riscv64 => Target::initialize_riscv(&config),
        Arch::Wasm32 => Target::initialize_webassembly(&config),
        Arch::ThumbV7em => Target::initialize_arm(&config),
        Arch::Other(_) => Target::initialize_all(&config),
    }
}

fn reloc_mode(reloc: RelocModel) -> RelocMode {
    match reloc {
        RelocModel::Static => RelocMode::Static,
        RelocModel::Pic => RelocMode::PIC,
    }
}

fn code_model(model: CodeModel) -> LlvmCodeModel {
    match model {
        // inkwell has no tiny model; small is the closest superset.
        CodeModel::Tiny | CodeModel::Small => LlvmCodeModel::Small,
        CodeModel::Kernel => LlvmCodeModel::Kernel,
        CodeModel::Medium => LlvmCodeModel::Medium,
        CodeModel::Large => LlvmCodeModel::Large,
    }
}

impl TargetMachine {
    /// Create the equivalent LLVM target machine.
    pub fn to_llvm(&self, level: OptimizationLevel) -> Result<inkwell::targets::TargetMachine> {
        initialize_target(self.triple().arch());

        let triple = self.triple().to_string();
        let target_triple = TargetTriple::create(&triple);
        let target = Target::from_triple(&target_triple).map_err(|e| TargetError::LlvmTargetFailed {
            triple: triple.clone(),
            message: e.to_string(),
        })?;

        target
            .create_target_machine(
                &target_triple,
                self.cpu(),
                &self.features().render(),
                level,
                reloc_mode(self.reloc()),
                code_model(self.code_model()),
            )
            .ok_or_else(|| TargetError::LlvmTargetFailed {
                triple,
                message: "create_target_machine returned null".into(),
            })
    }

    /// Stamp the same function attributes as
    /// [`TargetMachine::apply_function_attributes`] on every function with a
    /// body in `module`. Returns the number of functions touched.
    pub fn apply_llvm_function_attributes(&self, module: &Module<'_>) -> usize {
        let context = module.get_context();
        let features = self.features().render();
        let mut attributes = vec![
            context.create_string_attribute(TARGET_CPU_ATTR, self.cpu()),
            context.create_string_attribute(TARGET_FEATURES_ATTR, &features),
        ];
        if self.options().frame_pointer != FramePointer::None {
            attributes.push(context.create_string_attribute(
                FRAME_POINTER_ATTR,
                self.options().frame_pointer.as_attribute(),
            ));
        }

        let mut touched = 0;
        for function in module.get_functions() {
            if function.count_basic_blocks() == 0 {
                continue;
            }
            for attribute in &attributes {
                function.add_attribute(AttributeLoc::Function, *attribute);
            }
            touched += 1;
        }
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::TargetOptions;
    use crate::triple::Triple;
    use inkwell::context::Context;

    #[test]
    fn native_machine_matches_descriptor() {
        let triple = Triple::parse("x86_64-unknown-linux-gnu").unwrap();
        let tm = TargetMachine::from_parameters(&triple, "x86-64-v2", "", TargetOptions::default(), true)
            .unwrap();
        let native = tm.to_llvm(OptimizationLevel::Default).unwrap();
        assert_eq!(native.get_cpu().to_string(), "x86-64-v2");
        assert_eq!(native.get_triple().as_str().to_str().unwrap(), triple.to_string());
    }

    #[test]
    fn frame_pointer_policy_reaches_native_functions() {
        let options = TargetOptions {
            frame_pointer: FramePointer::All,
            ..TargetOptions::default()
        };
        let triple = Triple::parse("aarch64-unknown-linux-gnu").unwrap();
        let tm = TargetMachine::from_parameters(&triple, "cortex-a53", "", options, false).unwrap();

        let context = Context::create();
        let module = context.create_module("demo");
        let void = context.void_type().fn_type(&[], false);
        let defined = module.add_function("defined", void, None);
        let builder = context.create_builder();
        builder.position_at_end(context.append_basic_block(defined, "entry"));
        builder.build_return(None).unwrap();
        let declared = module.add_function("declared", void, None);

        assert_eq!(tm.apply_llvm_function_attributes(&module), 1);
        let frame_pointer = defined
            .get_string_attribute(AttributeLoc::Function, FRAME_POINTER_ATTR)
            .unwrap();
        assert_eq!(frame_pointer.get_string_value().to_str().unwrap(), "all");
        let cpu = defined
            .get_string_attribute(AttributeLoc::Function, TARGET_CPU_ATTR)
            .unwrap();
        assert_eq!(cpu.get_string_value().to_str().unwrap(), "cortex-a53");
        assert!(declared
            .get_string_attribute(AttributeLoc::Function, TARGET_CPU_ATTR)
            .is_none());
    }
}
