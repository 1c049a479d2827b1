// Sampler adapter: the injected source of one Snapshot per tick

mod sysinfo_sampler;

pub use sysinfo_sampler::SysinfoSampler;

use std::future::Future;

use crate::error::SampleError;
use crate::models::Snapshot;

/// Produces point-in-time per-process CPU figures plus free memory.
///
/// Implementations may block or take noticeable wall time; the poll loop
/// never holds the monitor state lock while awaiting them.
pub trait Sampler: Send + Sync + 'static {
    fn sample(&self) -> impl Future<Output = Result<Snapshot, SampleError>> + Send;
}
