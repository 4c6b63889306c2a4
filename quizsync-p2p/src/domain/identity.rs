use crate::domain::PeerId;
use quizsync_core::SessionId;

/// Rendezvous identifier shared by all devices of one user in one session
///
/// Pure and deterministic. Characters outside `[A-Za-z0-9_-]` are dropped
/// so the result is a valid transport identifier and a valid URL path
/// segment. Distinct inputs may collide after stripping.
pub fn rendezvous_id(session: &SessionId, user: &str) -> PeerId {
    let raw = format!("{}_{}", session.as_str(), user);
    PeerId::new(
        raw.chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect::<String>(),
    )
}
