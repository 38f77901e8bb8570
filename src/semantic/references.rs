//! Base-library references
//!
//! A compilation always sees the embedded core library. Extension libraries
//! are JSON manifests listing their types; their locations differ from
//! machine to machine, so resolving them can fail.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::MarkerConfig;
use crate::tree_sitter::{MemberDecl, MemberKind, TypeDecl, TypeKind};

/// Name under which the embedded core library is referenced
pub const CORE_LIBRARY: &str = "System.Runtime";

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("reference {path} could not be read: {source}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reference {path} is not a valid manifest: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One entry of the reference set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSpec {
    CoreLibrary,
    Manifest(PathBuf),
}

impl ReferenceSpec {
    /// The fixed reference set: core library first, then configured extensions
    pub fn reference_set(config: &MarkerConfig) -> Vec<ReferenceSpec> {
        std::iter::once(ReferenceSpec::CoreLibrary)
            .chain(
                config
                    .extension_references
                    .iter()
                    .cloned()
                    .map(ReferenceSpec::Manifest),
            )
            .collect()
    }
}

/// Types contributed by one referenced library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLibrary {
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

/// Locates references on the running machine
pub trait ReferenceResolver: Send + Sync {
    fn resolve(&self, spec: &ReferenceSpec) -> Result<ReferenceLibrary, ReferenceError>;
}

/// Resolves manifests from the filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FileReferenceResolver;

impl ReferenceResolver for FileReferenceResolver {
    fn resolve(&self, spec: &ReferenceSpec) -> Result<ReferenceLibrary, ReferenceError> {
        match spec {
            ReferenceSpec::CoreLibrary => Ok(core_library()),
            ReferenceSpec::Manifest(path) => {
                let bytes = fs::read(path).map_err(|source| ReferenceError::NotFound {
                    path: path.clone(),
                    source,
                })?;
                serde_json::from_slice(&bytes).map_err(|source| ReferenceError::Invalid {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}

/// The built-in types every compilation can resolve
pub fn core_library() -> ReferenceLibrary {
    let interface = |name: &str| TypeDecl::new(name, TypeKind::Interface);
    let primitive = |name: &str| {
        TypeDecl::new(name, TypeKind::Struct).with_bases(["IComparable", "IEquatable"])
    };

    let mut types = vec![
        TypeDecl::new("Object", TypeKind::Class)
            .with_member(MemberDecl::new("ToString", MemberKind::Method, Some("String")))
            .with_member(MemberDecl::new("GetHashCode", MemberKind::Method, Some("Int32"))),
        TypeDecl::new("String", TypeKind::Class)
            .with_bases(["IComparable", "IEquatable", "IEnumerable", "ICloneable"])
            .with_member(MemberDecl::new("Length", MemberKind::Property, Some("Int32")))
            .with_member(MemberDecl::new("Trim", MemberKind::Method, Some("String"))),
        TypeDecl::new("Exception", TypeKind::Class)
            .with_member(MemberDecl::new("Message", MemberKind::Property, Some("String"))),
        interface("IDisposable"),
        interface("IEnumerable"),
        interface("IComparable"),
        interface("IEquatable"),
        interface("ICloneable"),
    ];
    types.extend(
        [
            "Boolean", "Char", "Byte", "SByte", "Int16", "UInt16", "Int32", "UInt32", "Int64",
            "UInt64", "Single", "Double", "Decimal",
        ]
        .into_iter()
        .map(primitive),
    );
    for decl in &mut types {
        decl.namespace = Some("System".to_string());
    }

    ReferenceLibrary {
        name: CORE_LIBRARY.to_string(),
        types,
    }
}
