//! Device tags used to scope evaluation plans

use std::fmt;

use serde::{Deserialize, Serialize};

/// Device on which a tensor lives and its kernels run.
///
/// Only the CPU executes kernels today; every plan is keyed by one device so
/// additional variants slot in without touching the plan bookkeeping.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    Cpu,
}

impl Device {
    pub const fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl Default for Device {
    fn default() -> Self {
        Device::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_features() {
        assert!(Device::Cpu.is_cpu());
        assert_eq!(Device::default(), Device::Cpu);
        assert_eq!(Device::Cpu.to_string(), "cpu");
    }
}
