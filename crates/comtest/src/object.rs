//! IUnknown semantics

use crate::hresult::HResult;
use dcerpc::Uuid;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identity and lifetime of a COM object
pub trait ComObject: Send + Sync + 'static {
    /// Class this instance was created from
    fn clsid(&self) -> Uuid;

    /// IIDs this object answers QueryInterface for
    fn supported_interfaces(&self) -> Vec<Uuid>;

    fn query_interface(&self, iid: &Uuid) -> HResult {
        if self.supported_interfaces().contains(iid) {
            HResult::S_OK
        } else {
            HResult::E_NOINTERFACE
        }
    }

    /// Returns the new reference count
    fn add_ref(&self) -> u32;

    /// Returns the new reference count
    fn release(&self) -> u32;
}

/// Atomic reference count that saturates at zero
#[derive(Debug)]
pub struct RefCount(AtomicU32);

impl RefCount {
    /// A count owned by one reference
    pub fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    pub fn increment(&self) -> u32 {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_add(1)))
            .map_or(u32::MAX, |prev| prev.saturating_add(1))
    }

    pub fn decrement(&self) -> u32 {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .map_or(0, |prev| prev.saturating_sub(1))
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}
