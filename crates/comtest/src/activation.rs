//! Class activation
//!
//! Maps CLSIDs to factories and hands out new instances, the local
//! counterpart of CoCreateInstance.

use crate::automation::Dispatch;
use crate::com_test::ComTest;
use crate::error::{ComError, ComResult};
use crate::hresult::HResult;
use crate::ids::CLSID_COMTEST;
use crate::interface::IComTest;
use crate::object::ComObject;
use dcerpc::Uuid;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// An object that can be served over the wire
pub trait ComServerObject: ComObject + IComTest + Dispatch {}

impl<T: ComObject + IComTest + Dispatch> ComServerObject for T {}

/// Class factory creating a fresh instance per call
pub type ClassFactory = Arc<dyn Fn() -> Arc<dyn ComServerObject> + Send + Sync>;

/// Registered classes by CLSID
#[derive(Default)]
pub struct ClassRegistry {
    factories: RwLock<HashMap<Uuid, ClassFactory>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with ComTest registered
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_class(
            CLSID_COMTEST,
            Arc::new(|| Arc::new(ComTest::new()) as Arc<dyn ComServerObject>),
        );
        registry
    }

    pub fn register_class(&self, clsid: Uuid, factory: ClassFactory) {
        debug!("Registering class {}", clsid);
        self.factories.write().insert(clsid, factory);
    }

    pub fn unregister_class(&self, clsid: &Uuid) -> bool {
        self.factories.write().remove(clsid).is_some()
    }

    pub fn is_registered(&self, clsid: &Uuid) -> bool {
        self.factories.read().contains_key(clsid)
    }

    /// Create an instance of `clsid` and check that it supports `iid`
    pub fn create_instance(
        &self,
        clsid: &Uuid,
        iid: &Uuid,
    ) -> ComResult<Arc<dyn ComServerObject>> {
        let factory = self.factories.read().get(clsid).cloned();
        let Some(factory) = factory else {
            warn!("Class {} is not registered", clsid);
            return Err(ComError::HResult(HResult::REGDB_E_CLASSNOTREG));
        };

        let object = factory();
        let hr = object.query_interface(iid);
        if hr.failed() {
            debug!("Class {} does not support {}", clsid, iid);
            return Err(ComError::HResult(hr));
        }
        Ok(object)
    }
}
