//! Pipeline configuration.

use std::fmt;
use std::str::FromStr;

use crate::backend::DeviceClass;

/// Default kernel entry point.
pub const DEFAULT_ENTRY_POINT: &str = "gamma_transform";

/// Work-group extent used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalSize {
    /// Let the runtime choose.
    Auto,
    /// Explicit `[rows, cols]` tile. Must divide the global extent.
    Fixed([usize; 2]),
}

impl Default for LocalSize {
    fn default() -> Self {
        Self::Fixed([1, 1])
    }
}

impl fmt::Display for LocalSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed([r, c]) => write!(f, "{r}x{c}"),
        }
    }
}

impl FromStr for LocalSize {
    type Err = String;

    /// Parses `auto` or `RxC` (e.g. `8x8`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        let (r, c) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("invalid local size '{s}' (expected auto or RxC)"))?;
        let parse = |v: &str| -> Result<usize, String> {
            match v.trim().parse::<usize>() {
                Ok(0) | Err(_) => Err(format!(
                    "invalid local size '{s}': extents must be positive integers"
                )),
                Ok(n) => Ok(n),
            }
        };
        Ok(Self::Fixed([parse(r)?, parse(c)?]))
    }
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Device class to resolve.
    pub device_class: DeviceClass,
    /// Kernel entry point, matched exactly.
    pub entry_point: String,
    /// Options passed to the kernel compiler.
    pub build_options: String,
    /// Work-group extent.
    pub local_size: LocalSize,
    /// Drain the queue before releasing resources.
    pub finish_on_teardown: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            device_class: DeviceClass::Cpu,
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            build_options: String::new(),
            local_size: LocalSize::default(),
            finish_on_teardown: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_device_class(mut self, class: DeviceClass) -> Self {
        self.device_class = class;
        self
    }

    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = name.into();
        self
    }

    pub fn with_build_options(mut self, options: impl Into<String>) -> Self {
        self.build_options = options.into();
        self
    }

    pub fn with_local_size(mut self, local: LocalSize) -> Self {
        self.local_size = local;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.device_class, DeviceClass::Cpu);
        assert_eq!(cfg.entry_point, "gamma_transform");
        assert!(cfg.build_options.is_empty());
        assert_eq!(cfg.local_size, LocalSize::Fixed([1, 1]));
        assert!(cfg.finish_on_teardown);
    }

    #[test]
    fn test_local_size_parse() {
        assert_eq!("auto".parse::<LocalSize>().unwrap(), LocalSize::Auto);
        assert_eq!("8x4".parse::<LocalSize>().unwrap(), LocalSize::Fixed([8, 4]));
        assert_eq!(" 2X2 ".parse::<LocalSize>().unwrap(), LocalSize::Fixed([2, 2]));
        assert!("0x4".parse::<LocalSize>().is_err());
        assert!("8".parse::<LocalSize>().is_err());
        assert!("axb".parse::<LocalSize>().is_err());
    }

    #[test]
    fn test_local_size_display() {
        assert_eq!(LocalSize::Fixed([16, 1]).to_string(), "16x1");
        assert_eq!(LocalSize::Auto.to_string(), "auto");
    }
}
