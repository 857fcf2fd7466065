// ============================================================
// Layer 6 — Backend Selection
// ============================================================
// Which Burn backend runs the network:
//   - wgpu:    GPU through WebGPU (Vulkan / Metal / DX12)
//   - ndarray: CPU, no GPU required
//
// Training wraps either one in Autodiff; inference and
// validation use the plain backend.

use burn::backend::{wgpu::WgpuDevice, Autodiff, NdArray, Wgpu};
use serde::{Deserialize, Serialize};

pub type GpuBackend      = Wgpu;
pub type CpuBackend      = NdArray<f32>;
pub type GpuTrainBackend = Autodiff<GpuBackend>;
pub type CpuTrainBackend = Autodiff<CpuBackend>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Wgpu,
    Cpu,
}

pub fn gpu_device() -> WgpuDevice {
    WgpuDevice::default()
}
