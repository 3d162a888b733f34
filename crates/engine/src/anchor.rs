//! Anchor resolution.

use metadata::{ElementRef, Entity, Error, Result, SnapshotProvider};

/// Finds the anchor that governs an element.
///
/// Anchors are top-level owners: the anchor's own `anchor_guid` is not
/// followed.
pub struct AnchorResolver<'a> {
    snapshots: &'a dyn SnapshotProvider,
}

impl<'a> AnchorResolver<'a> {
    pub fn new(snapshots: &'a dyn SnapshotProvider) -> Self {
        Self { snapshots }
    }

    /// The anchor snapshot of `member`, or `None` if it is unanchored or
    /// anchored to itself.
    pub fn resolve(&self, member: ElementRef<'_>) -> Result<Option<Entity>> {
        let Some(anchor_guid) = member.anchor_guid() else {
            return Ok(None);
        };
        let anchor = self.snapshots.entity(anchor_guid)?;
        if anchor.guid() != anchor_guid {
            return Err(Error::Unavailable(format!(
                "provider returned {} for anchor {anchor_guid}",
                anchor.guid()
            )));
        }
        Ok(Some(anchor))
    }
}
