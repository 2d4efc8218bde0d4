//! Operation-unit contract.

use async_trait::async_trait;

use crate::context::InstallContext;
use crate::phase::Phase;
use crate::platform::Platform;
use crate::task::TaskResult;

/// One operation unit of the install workflow.
///
/// Units are registered explicitly with the
/// [`PluginManager`](crate::PluginManager) and dispatched per phase. A
/// unit runs only when the job's platform family is in `platforms()`, the
/// dispatched phase is in `phases()`, and any active name filter includes
/// `name()`.
///
/// Units are stateless between runs: everything a run learns is recorded
/// in the context's [`JobOutcome`](crate::JobOutcome).
#[async_trait]
pub trait InstallPlugin: Send + Sync {
    /// Human-readable unit name, used for logs and name filtering.
    fn name(&self) -> &'static str;

    /// Platform families this unit supports.
    fn platforms(&self) -> &'static [Platform];

    /// Phases this unit participates in.
    fn phases(&self) -> &'static [Phase];

    /// Runs the unit.
    ///
    /// A returned error is fatal for the dispatch: later units generally
    /// assume earlier ones fully succeeded, so the scheduler does not
    /// continue past a failure.
    async fn run(&self, ctx: &mut InstallContext) -> TaskResult<()>;
}
