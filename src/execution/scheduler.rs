//! Execution scheduler - determines which agent runs next

use crate::core::RoutingTable;

/// Pick the agent after `current`
///
/// A non-empty next-step override from the agent's result always wins; the
/// routing table is consulted only without one. `None` terminates the run.
pub fn next_agent(
    current: &str,
    next_override: Option<&str>,
    routing: &RoutingTable,
) -> Option<String> {
    next_override
        .filter(|next| !next.is_empty())
        .or_else(|| routing.next(current))
        .map(str::to_string)
}
