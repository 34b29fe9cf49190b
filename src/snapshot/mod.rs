//! Snapshot store: program state observed while running each variant.
//!
//! One [`Observation`] is kept per `(variant, test id, position)` triple.
//! The reference program is variant `0`; mutants are `1..=N`.

pub mod dump;
pub mod observation;
pub mod store;

pub use dump::{DumpIssue, RecordedObservation, SnapshotDump};
pub use observation::{FieldMap, Fragment, FragmentKind, Observation, ObservationKey, VariantIndex};
pub use store::SnapshotStore;
