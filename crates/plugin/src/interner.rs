use smol_str::SmolStr;

/// Shared name table used to compact serialized stubs.
///
/// Lookups may run concurrently; implementations serialize every mutation
/// (new names, repair) behind one lock.
pub trait NameInterner: Send + Sync {
    /// Return the id for `name`, assigning a new one if needed.
    fn intern(&self, name: &str) -> u32;

    /// Resolve an id handed out by `intern`.
    fn resolve(&self, id: u32) -> Option<SmolStr>;

    fn is_corrupted(&self) -> bool;

    /// Flag the table as unusable, e.g. when a stored id no longer resolves.
    fn mark_corrupted(&self, reason: &str);

    /// Reset the table to a usable (empty) state. Ids handed out before the
    /// repair are invalid afterwards.
    fn repair(&self);
}
