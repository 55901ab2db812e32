//! Device resolution.
//!
//! Picks the first platform and the first device of the requested class on
//! it. There is no selection policy beyond that.

use tracing::info;

use crate::backend::{ApiError, ComputeApi, DeviceCaps, DeviceClass, status};
use crate::{ComputeError, ComputeResult};

/// The one device a run executes on.
pub struct ResolvedDevice<A: ComputeApi> {
    /// Device handle.
    pub device: A::Device,
    /// Capabilities reported at resolution time.
    pub caps: DeviceCaps,
}

impl<A: ComputeApi> std::fmt::Debug for ResolvedDevice<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedDevice")
            .field("caps", &self.caps)
            .finish()
    }
}

/// Resolve one device of `class`.
///
/// Zero platforms fails with `CL_PLATFORM_NOT_FOUND_KHR`, zero matching
/// devices with `CL_DEVICE_NOT_FOUND`. Capabilities are logged and
/// returned; they are not used to shrink later allocations.
pub fn resolve_device<A: ComputeApi>(
    api: &A,
    class: DeviceClass,
) -> ComputeResult<ResolvedDevice<A>> {
    let unavailable = |reason: &str, source: ApiError| ComputeError::DeviceUnavailable {
        class,
        reason: reason.to_string(),
        source,
    };

    let platforms = api
        .platforms()
        .map_err(|e| unavailable("platform query failed", e))?;
    info!(backend = api.name(), platforms = platforms.len(), "Found compute platforms");

    let platform = platforms.first().ok_or_else(|| {
        unavailable("no platform found", ApiError::new(status::PLATFORM_NOT_FOUND_KHR))
    })?;

    // Only the first device is kept; the rest drop here.
    let device = match api.devices(platform, class) {
        Ok(devices) => devices.into_iter().next(),
        Err(e) if e.code == status::DEVICE_NOT_FOUND => None,
        Err(e) => return Err(unavailable("device query failed", e)),
    }
    .ok_or_else(|| unavailable("no matching device", ApiError::new(status::DEVICE_NOT_FOUND)))?;

    let caps = api
        .device_caps(&device)
        .map_err(|e| unavailable("capability query failed", e))?;
    info!(
        device = %caps.name,
        vendor = %caps.vendor,
        max_alloc_bytes = caps.max_alloc_bytes,
        base_align_bytes = caps.base_align_bytes,
        "Resolved {} device",
        class
    );

    Ok(ResolvedDevice { device, caps })
}
