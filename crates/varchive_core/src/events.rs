//! Checkout event listeners.

use crate::types::CommitRecord;

/// Receives notifications around checkouts.
///
/// `pre_checkout` fires before any destructive action on the working
/// area, `post_checkout` after the target revision has been fully
/// materialised. Listener panics are the caller's responsibility; they do
/// not alter session state.
pub trait VersionEventListener {
    /// Called before the working area is cleaned for a checkout.
    fn pre_checkout(&self, commit: &CommitRecord);

    /// Called after the target revision has been materialised.
    fn post_checkout(&self, commit: &CommitRecord);
}
