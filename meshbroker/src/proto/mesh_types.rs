//! Mesh kind tags and input/output type pairs.
//!
//! Every job and every worker capability is described by a [`MeshIOType`]:
//! an ordered `(input, output)` pair of [`MeshKind`] tags. The set of tags is
//! closed; unrecognized tags never get past the codec.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single mesh-domain tag.
///
/// The registry is a fixed, closed set. Adding a variant is a protocol
/// change: both peers must agree on the tag strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeshKind {
    Edges,
    Mesh1D,
    Mesh2D,
    Mesh3D,
    Mesh3DSurface,
    SceneFile,
    Model,
}

impl MeshKind {
    /// All registered kinds, in tag order.
    pub const ALL: [MeshKind; 7] = [
        MeshKind::Edges,
        MeshKind::Mesh1D,
        MeshKind::Mesh2D,
        MeshKind::Mesh3D,
        MeshKind::Mesh3DSurface,
        MeshKind::SceneFile,
        MeshKind::Model,
    ];

    /// The wire tag for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            MeshKind::Edges => "Edges",
            MeshKind::Mesh1D => "Mesh1D",
            MeshKind::Mesh2D => "Mesh2D",
            MeshKind::Mesh3D => "Mesh3D",
            MeshKind::Mesh3DSurface => "Mesh3DSurface",
            MeshKind::SceneFile => "SceneFile",
            MeshKind::Model => "Model",
        }
    }
}

impl fmt::Display for MeshKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for MeshKind {
    type Err = UnknownMeshKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MeshKind::ALL
            .iter()
            .copied()
            .find(|k| k.tag() == s)
            .ok_or_else(|| UnknownMeshKind(s.to_string()))
    }
}

/// Error returned when a tag is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mesh kind tag '{0}'")]
pub struct UnknownMeshKind(pub String);

/// An ordered `(input, output)` pair naming a class of mesh-generation task.
///
/// Equality and hashing are structural on the pair: `(Mesh2D, Mesh3D)` and
/// `(Mesh3D, Mesh2D)` are distinct capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshIOType {
    pub input: MeshKind,
    pub output: MeshKind,
}

impl MeshIOType {
    pub fn new(input: MeshKind, output: MeshKind) -> Self {
        Self { input, output }
    }

    /// The combined wire tag, `"<input>:<output>"`.
    pub fn tag(&self) -> String {
        format!("{}:{}", self.input, self.output)
    }
}

impl fmt::Display for MeshIOType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.input, self.output)
    }
}

impl FromStr for MeshIOType {
    type Err = UnknownMeshKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (input, output) = s
            .split_once(':')
            .ok_or_else(|| UnknownMeshKind(s.to_string()))?;
        Ok(Self {
            input: input.parse()?,
            output: output.parse()?,
        })
    }
}
