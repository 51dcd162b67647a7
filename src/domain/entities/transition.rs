/// Result of a guarded status transition.
///
/// `Unchanged` is not an error: the entity was already past (or outside) the
/// guarded source states, which is the normal case for duplicate or
/// out-of-order provider notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition<T> {
    Applied(T),
    Unchanged(T),
}

impl<T> Transition<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Transition::Applied(v) | Transition::Unchanged(v) => v,
        }
    }

    pub fn get(&self) -> &T {
        match self {
            Transition::Applied(v) | Transition::Unchanged(v) => v,
        }
    }
}
