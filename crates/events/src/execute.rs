/// Decide and evolve in one step, without persistence.
///
/// Runs `handle` and folds the resulting events back into the aggregate. The
/// dispatcher in `storeledger-infra` does the same around a real event store;
/// this is for unit tests and pure what-if calculations.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: storeledger_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        aggregate.apply(ev);
    }
    Ok(events)
}
