//! Tree Engine
//!
//! Pure and store-backed algorithms over a document's flat node records:
//!
//! - [`snapshot`] - flattens a submitted nested tree into desired node states
//! - [`reconciler`] - replaces a stored tree with a submitted one in one bulk write
//! - [`view`] - rebuilds the nested tree from stored records
//! - [`integrity`] - verifies the structural invariants of stored records

pub mod integrity;
pub mod reconciler;
pub mod snapshot;
pub mod view;

pub use integrity::{check_document_tree, IntegrityReport, IntegrityViolation};
pub use reconciler::{plan_reconciliation, ReconcileOutcome, ReconcilePlan, TreeReconciler};
pub use snapshot::{DesiredNode, TreeSnapshot};
pub use view::build_document_tree;
