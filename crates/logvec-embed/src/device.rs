use candle_core::Device;
use tracing::{info, warn};

use logvec_core::config::DeviceKind;

pub fn select_device(kind: DeviceKind) -> Device {
    if kind == DeviceKind::Metal {
        #[cfg(feature = "metal")]
        {
            if let Ok(dev) = Device::new_metal(0) { info!("device: Metal (MPS)"); return dev; }
        }
        warn!("Metal device unavailable; falling back to CPU");
    }
    info!("device: CPU");
    Device::Cpu
}
