use medsupply_core::CommandId;

/// An outbound command (intent addressed to a downstream hub).
///
/// Commands represent **intent** ("create this order") as opposed to the
/// facts recorded in the store. They are transient from this system's point of
/// view: once handed to the bus, delivery and execution are the downstream
/// collaborator's concern.
///
/// ## Identity
///
/// Every command carries a unique `command_id` so that consumers receiving it
/// more than once (at-least-once delivery) can deduplicate.
///
/// ## Design Constraints
///
/// Commands must be:
/// - **Cloneable**: the bus fans a command out to every subscriber
/// - **Send + Sync**: commands cross thread boundaries (workers, HTTP handlers)
/// - **'static**: commands own all their data
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable command type name (e.g. "CreateOrder").
    fn command_type(&self) -> &'static str;

    fn command_id(&self) -> &CommandId;
}
