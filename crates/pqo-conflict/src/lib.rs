//! pqo-conflict — version-vector conflict detection, three-way merge, and
//! CRDTs (spec §4.9).

pub mod crdt;
pub mod detect;
pub mod merge;

pub use crdt::{GCounter, LwwMap, LwwRegister, PnCounter};
pub use detect::{detect, DetectOutcome, FieldConflict, FieldConflictKind};
pub use merge::{merge_version_vectors, three_way_merge, MergeResult};
