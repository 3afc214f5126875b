//! Capabilities of objects linked through a mediator.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use quire_foundation::{InstanceId, Value};

use crate::mediator::Mediator;
use crate::version::Version;

/// Name of a relationship edge (usually the field holding the slave).
pub type EdgeName = Option<Arc<str>>;

/// An object that can take part in master/slave relationships.
///
/// Participants start without a mediator and adopt one when they are linked
/// to a master that has one.
pub trait Participant {
    /// Stable identity used as the edge key.
    fn instance_id(&self) -> InstanceId;

    /// Returns true once destroyed; destroyed participants are skipped.
    fn is_destroyed(&self) -> bool;

    /// The mediator currently holding this participant's edges.
    fn mediator(&self) -> Option<Mediator>;

    /// Replaces the mediator.
    fn adopt_mediator(&self, mediator: Mediator);

    /// Receiver of change notifications, if this participant handles them.
    fn receiver(&self) -> Option<&dyn RelationReceiver> {
        None
    }

    /// Version counter, if this participant tracks versions.
    fn versioned(&self) -> Option<&dyn VersionTracked> {
        None
    }

    /// Destroys the participant (cascade from a destroyed master).
    fn destroy(&self) {}
}

/// Shared handle to a participant.
pub type ParticipantRef = Rc<dyn Participant>;

/// Monotonic version counter capability.
pub trait VersionTracked {
    /// The participant's version counter.
    fn version(&self) -> &Version;
}

/// Payload travelling along relationship edges.
#[derive(Clone, Debug)]
pub enum ChangeData {
    /// Named values changed.
    Fields(Vec<(Arc<str>, Value)>),
    /// Changes were accepted.
    Accept,
    /// Changes were rejected.
    Reject,
    /// The format changed.
    Format,
    /// Anything else.
    Custom(Value),
}

impl ChangeData {
    /// Single-field change.
    #[must_use]
    pub fn field(name: impl Into<Arc<str>>, value: Value) -> Self {
        Self::Fields(vec![(name.into(), value)])
    }
}

/// Describes a change travelling upward.
#[derive(Clone)]
pub struct Which {
    /// The participant where the change originated.
    pub target: ParticipantRef,
    /// Current payload, possibly rewritten by intermediate masters.
    pub data: ChangeData,
    /// Payload as emitted by the target.
    pub original: ChangeData,
}

impl fmt::Debug for Which {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Which")
            .field("target", &self.target.instance_id())
            .field("data", &self.data)
            .field("original", &self.original)
            .finish()
    }
}

/// Receives notifications from related participants.
pub trait RelationReceiver {
    /// Called on every master above a changed participant.
    ///
    /// `route[0]` is the name of the edge from this master down towards the
    /// target, followed by the names of the edges below it. Returning
    /// `Some(data)` replaces the payload for the masters further up.
    fn relation_changed(&self, which: &Which, route: &[EdgeName]) -> Option<ChangeData>;

    /// Called on direct slaves when their master broadcasts a change.
    fn parent_changed(&self, data: &ChangeData, name: Option<&str>) {
        let _ = (data, name);
    }
}
