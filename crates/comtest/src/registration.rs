//! Type library registration
//!
//! Self-registration writes the type library entries a COM client uses
//! to find the library:
//!
//! ```text
//! TypeLib\{CLSID}\<major>.<minor>     (default) = description
//! TypeLib\{CLSID}\<major>.<minor>\0\win32   (default) = <module>.comhost.tlb
//! TypeLib\{CLSID}\<major>.<minor>\FLAGS     (default) = "0"
//! ```
//!
//! The hive is an in-memory store with registry semantics: key paths use
//! `\` separators and compare case-insensitively, and the empty value name
//! is the key's default value.

use crate::ids::{CLSID_COMTEST, TYPELIB_VERSION};
use dcerpc::Uuid;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Extension of the type library file next to the module
pub const TYPELIB_EXTENSION: &str = "comhost.tlb";

#[derive(Debug, Clone, Default)]
struct Key {
    /// Path as first created
    path: String,
    /// Values by lowercase name: (name, data)
    values: BTreeMap<String, (String, String)>,
}

/// In-memory registry hive
#[derive(Debug, Default)]
pub struct RegistryStore {
    keys: RwLock<BTreeMap<String, Key>>,
}

/// Canonical path: separators collapsed, no leading or trailing `\`
fn normalize(path: &str) -> String {
    path.split('\\')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("\\")
}

fn lookup_key(path: &str) -> String {
    normalize(path).to_ascii_lowercase()
}

impl RegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a key and any missing ancestors
    pub fn create_key(&self, path: &str) {
        let path = normalize(path);
        let mut keys = self.keys.write();
        let mut prefix = String::new();
        for segment in path.split('\\').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('\\');
            }
            prefix.push_str(segment);
            keys.entry(prefix.to_ascii_lowercase()).or_insert_with(|| Key {
                path: prefix.clone(),
                values: BTreeMap::new(),
            });
        }
    }

    /// Set a string value, creating the key if needed
    pub fn set_value(&self, path: &str, name: &str, data: &str) {
        self.create_key(path);
        if let Some(key) = self.keys.write().get_mut(&lookup_key(path)) {
            key.values
                .insert(name.to_ascii_lowercase(), (name.to_string(), data.to_string()));
        }
    }

    pub fn get_value(&self, path: &str, name: &str) -> Option<String> {
        self.keys
            .read()
            .get(&lookup_key(path))?
            .values
            .get(&name.to_ascii_lowercase())
            .map(|(_, data)| data.clone())
    }

    /// Default (unnamed) value of a key
    pub fn default_value(&self, path: &str) -> Option<String> {
        self.get_value(path, "")
    }

    pub fn key_exists(&self, path: &str) -> bool {
        self.keys.read().contains_key(&lookup_key(path))
    }

    /// Immediate subkey names of a key
    pub fn subkeys(&self, path: &str) -> Vec<String> {
        let parent = lookup_key(path);
        let prefix = if parent.is_empty() {
            String::new()
        } else {
            format!("{parent}\\")
        };
        self.keys
            .read()
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix) && !k[prefix.len()..].contains('\\'))
            .filter_map(|(_, key)| key.path.rsplit('\\').next().map(str::to_string))
            .collect()
    }

    /// Remove a key with everything beneath it; returns whether it existed
    pub fn delete_tree(&self, path: &str) -> bool {
        let target = lookup_key(path);
        if target.is_empty() {
            return false;
        }
        let nested = format!("{target}\\");
        let mut keys = self.keys.write();
        let before = keys.len();
        keys.retain(|k, _| *k != target && !k.starts_with(&nested));
        keys.len() != before
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

/// What self-registration records about the type library
#[derive(Debug, Clone)]
pub struct TypeLibRegistration {
    pub clsid: Uuid,
    pub major: u16,
    pub minor: u16,
    pub description: String,
    /// Location of the module the library ships with
    pub module_path: PathBuf,
}

impl Default for TypeLibRegistration {
    fn default() -> Self {
        Self {
            clsid: CLSID_COMTEST,
            major: TYPELIB_VERSION.0,
            minor: TYPELIB_VERSION.1,
            description: "ComTest Library".to_string(),
            module_path: PathBuf::from("ComTestLibrary.dll"),
        }
    }
}

impl TypeLibRegistration {
    /// `TypeLib\{CLSID}`
    pub fn root_key(&self) -> String {
        typelib_root(&self.clsid)
    }

    /// `TypeLib\{CLSID}\<major>.<minor>`
    pub fn version_key(&self) -> String {
        format!("{}\\{}.{}", self.root_key(), self.major, self.minor)
    }

    /// Module path with its extension replaced by `.comhost.tlb`
    pub fn typelib_path(&self) -> String {
        self.module_path
            .with_extension(TYPELIB_EXTENSION)
            .to_string_lossy()
            .into_owned()
    }
}

fn typelib_root(clsid: &Uuid) -> String {
    format!("TypeLib\\{}", clsid.to_registry_string())
}

/// DllRegisterServer
pub fn register_server(store: &RegistryStore, info: &TypeLibRegistration) {
    let version_key = info.version_key();
    store.set_value(&version_key, "", &info.description);
    store.set_value(&format!("{version_key}\\0\\win32"), "", &info.typelib_path());
    store.set_value(&format!("{version_key}\\FLAGS"), "", "0");
    info!("Registered type library under {}", version_key);
}

/// DllUnregisterServer; absent entries are not an error
pub fn unregister_server(store: &RegistryStore, clsid: &Uuid) {
    let root = typelib_root(clsid);
    if store.delete_tree(&root) {
        info!("Unregistered {}", root);
    } else {
        debug!("{} was not registered", root);
    }
}
