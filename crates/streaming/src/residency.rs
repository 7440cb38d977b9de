/// Lifecycle of one cached boundary.
///
/// Requested → Resident, or Requested → Failed. Aborted requests never become
/// resident: a late response for them is discarded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResidencyState {
    Requested,
    Resident,
    Failed,
    Aborted,
}

impl ResidencyState {
    /// Settled entries no longer wait on the network.
    pub fn is_settled(self) -> bool {
        !matches!(self, ResidencyState::Requested)
    }
}
