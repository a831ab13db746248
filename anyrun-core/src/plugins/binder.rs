//! Binding dynamic libraries to the plugin contract

use anyrun_plugin_api::{API_VERSION, Plugin, SYMBOL_API_VERSION, SYMBOL_CREATE};
use libloading::Library;
use std::path::Path;

use super::error::{BindError, LoadError, LoadStage};

/// A plugin instance together with whatever keeps its code mapped.
///
/// Field order matters: the instance is dropped before the library.
pub struct BoundPlugin {
    pub instance: Box<dyn Plugin>,
    pub library: Option<Library>,
}

impl BoundPlugin {
    /// Wrap an instance whose code is linked into the current binary
    pub fn in_process(instance: Box<dyn Plugin>) -> Self {
        Self {
            instance,
            library: None,
        }
    }
}

/// Turns a candidate file into a plugin instance.
///
/// [`LibraryBinder`] is the production implementation; tests provide
/// in-memory binders so the loader can be exercised without compiled
/// plugin libraries.
pub trait PluginBinder: Send + Sync {
    /// Whether a file in a plugin directory should be offered to [`bind`](Self::bind)
    fn is_candidate(&self, path: &Path) -> bool {
        has_library_extension(path)
    }

    /// Bind the file to the plugin contract.
    ///
    /// Contract violations are reported as [`LoadError::Incompatible`].
    fn bind(&self, path: &Path) -> Result<BoundPlugin, LoadError>;
}

/// Platform dynamic-library extensions, most specific first
pub fn library_extensions() -> &'static [&'static str] {
    if cfg!(target_os = "macos") {
        &["dylib", "so"]
    } else if cfg!(target_os = "windows") {
        &["dll"]
    } else {
        &["so"]
    }
}

pub fn has_library_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| library_extensions().contains(&ext))
}

/// Binds native libraries built with `anyrun_plugin_api::export_plugin!`
#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryBinder;

impl PluginBinder for LibraryBinder {
    fn bind(&self, path: &Path) -> Result<BoundPlugin, LoadError> {
        // SAFETY: the library comes from a directory the operator placed on
        // the plugin search path and is expected to follow the plugin contract.
        let library = unsafe { Library::new(path) }.map_err(|e| BindError::Open(e.to_string()))?;

        // SAFETY: the version entry point takes no arguments and returns a plain integer.
        let api_version_fn: libloading::Symbol<extern "C" fn() -> u32> =
            unsafe { library.get(SYMBOL_API_VERSION) }
                .map_err(|e| missing_symbol(SYMBOL_API_VERSION, e))?;

        let found = api_version_fn();
        if found != API_VERSION {
            return Err(BindError::ApiVersionMismatch {
                expected: API_VERSION,
                found,
            }
            .into());
        }

        // SAFETY: with a matching API version the create function returns a
        // pointer produced by `Box::into_raw` on a `Box<dyn Plugin>`.
        let create_fn: libloading::Symbol<extern "C" fn() -> *mut dyn Plugin> =
            unsafe { library.get(SYMBOL_CREATE) }.map_err(|e| missing_symbol(SYMBOL_CREATE, e))?;

        let instance = unsafe { instance_from_raw(create_fn()) }?;

        Ok(BoundPlugin {
            instance,
            library: Some(library),
        })
    }
}

/// Take ownership of the pointer returned by a plugin's create entry point.
///
/// A null pointer means the plugin's constructor panicked.
///
/// # Safety
///
/// A non-null `raw` must come from `Box::into_raw` on a `Box<dyn Plugin>`
/// and must not be used again by the caller.
unsafe fn instance_from_raw(raw: *mut dyn Plugin) -> Result<Box<dyn Plugin>, LoadError> {
    if raw.is_null() {
        return Err(LoadError::Panicked {
            stage: LoadStage::Create,
        });
    }
    Ok(unsafe { Box::from_raw(raw) })
}

fn missing_symbol(symbol: &[u8], err: libloading::Error) -> BindError {
    BindError::MissingSymbol {
        symbol: String::from_utf8_lossy(symbol).into_owned(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_library_extension_detection() {
        let ext = library_extensions()[0];
        assert!(has_library_extension(&PathBuf::from(format!("libshell.{ext}"))));
        assert!(!has_library_extension(Path::new("README.md")));
        assert!(!has_library_extension(Path::new("shell")));
    }

    #[test]
    fn test_library_binder_accepts_library_files() {
        let ext = library_extensions()[0];
        assert!(LibraryBinder.is_candidate(&PathBuf::from(format!("/p/libssh.{ext}"))));
        assert!(!LibraryBinder.is_candidate(Path::new("/p/ssh.toml")));
    }

    #[test]
    fn test_library_binder_rejects_non_library_as_incompatible() {
        let dir = TempDir::new().unwrap();
        let path = dir
            .path()
            .join(format!("libfake.{}", library_extensions()[0]));
        std::fs::write(&path, b"definitely not a shared object").unwrap();

        let err = LibraryBinder.bind(&path).err().unwrap();
        assert!(matches!(err, LoadError::Incompatible(BindError::Open(_))));
    }

    #[test]
    fn test_library_binder_missing_file_is_incompatible() {
        let err = LibraryBinder
            .bind(Path::new("/nonexistent/libnothing.so"))
            .err()
            .unwrap();
        assert!(matches!(err, LoadError::Incompatible(_)));
    }

    struct Inert;

    impl Plugin for Inert {
        fn manifest(&self) -> anyrun_plugin_api::PluginManifest {
            anyrun_plugin_api::PluginManifest {
                name: "inert".to_string(),
                ..Default::default()
            }
        }

        fn query(&self, _input: &str) -> Result<Vec<anyrun_plugin_api::Match>, anyrun_plugin_api::PluginError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_null_instance_is_a_create_panic() {
        let raw = std::ptr::null_mut::<Inert>() as *mut dyn Plugin;
        let err = unsafe { instance_from_raw(raw) }.err().unwrap();
        assert_eq!(
            err,
            LoadError::Panicked {
                stage: LoadStage::Create
            }
        );
    }

    #[test]
    fn test_instance_from_raw_takes_ownership() {
        let boxed: Box<dyn Plugin> = Box::new(Inert);
        let instance = unsafe { instance_from_raw(Box::into_raw(boxed)) }.unwrap();
        assert_eq!(instance.manifest().name, "inert");
    }
}
