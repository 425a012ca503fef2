/// Frontend-agnostic key identifiers.
///
/// Presentation shells translate their own input events into these before
/// handing them to an [`crate::app::App`] implementation. The set is the
/// union of what the bundled machines bind; unbound keys are ignored by
/// `handle_key_event`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    A,
    S,
    Z,
    X,
    Enter,
    Space,
    Escape,
}
