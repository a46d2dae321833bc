mod poller;

pub use poller::{Poller, Snapshot, SnapshotInfo};
