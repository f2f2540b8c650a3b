//! Compute device resolution for the generation engine.
//!
//! The fallback chain is an ordered list of capability probes evaluated
//! once at engine construction: CUDA, then CoreML, then CPU. The first
//! available device wins and is cached on the engine handle.

use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider,
    ExecutionProviderDispatch,
};

use crate::config::Device;

/// Resolves a requested device to a concrete one.
///
/// `Auto` probes the accelerator chain; explicit choices pass through
/// untouched.
pub fn resolve(requested: Device) -> Device {
    match requested {
        Device::Auto => probe(),
        device => device,
    }
}

/// Probes accelerators in priority order.
fn probe() -> Device {
    if CUDAExecutionProvider::default()
        .is_available()
        .unwrap_or(false)
    {
        return Device::Cuda;
    }
    if CoreMLExecutionProvider::default()
        .is_available()
        .unwrap_or(false)
    {
        return Device::CoreML;
    }
    Device::Cpu
}

/// Returns the ONNX Runtime execution providers for a resolved device.
///
/// CPU needs none; sessions fall back to the default provider.
pub fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
    match device {
        Device::Cuda => vec![CUDAExecutionProvider::default().build()],
        Device::CoreML => vec![CoreMLExecutionProvider::default().build()],
        Device::Cpu | Device::Auto => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_devices_pass_through() {
        assert_eq!(resolve(Device::Cpu), Device::Cpu);
        assert_eq!(resolve(Device::Cuda), Device::Cuda);
        assert_eq!(resolve(Device::CoreML), Device::CoreML);
    }

    #[test]
    fn auto_resolves_to_a_concrete_device() {
        let resolved = resolve(Device::Auto);
        assert_ne!(resolved, Device::Auto);
    }

    #[test]
    fn cpu_needs_no_providers() {
        assert!(execution_providers(Device::Cpu).is_empty());
    }

    #[test]
    fn accelerators_map_to_one_provider() {
        assert_eq!(execution_providers(Device::Cuda).len(), 1);
        assert_eq!(execution_providers(Device::CoreML).len(), 1);
    }
}
