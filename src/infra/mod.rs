//! Infrastructure adapters: local process execution and peer routing.

pub mod peers;
pub mod process;

pub use peers::{HashRing, MeshPicker, PeerMesh};
pub use process::ProcessExecutor;
