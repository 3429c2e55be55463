//! Peer routing: consistent-hash ring and the in-process mesh.

pub mod memory;
pub mod ring;

pub use memory::{MeshPicker, PeerMesh};
pub use ring::HashRing;
