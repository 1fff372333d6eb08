use many_cpus::{ProcessorId, ProcessorSet, ProcessorSetBuilder};

use crate::WorkerId;

/// Whether worker threads are pinned to processors.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, derive_more::Display)]
#[non_exhaustive]
pub enum Affinity {
    /// Workers run wherever the operating system schedules them.
    #[default]
    #[display("unpinned")]
    Unpinned,

    /// Worker `t` is pinned to the processor at position `t mod P` among the `P` processors
    /// available to the process, in ascending processor ID order.
    ///
    /// If the processors cannot be enumerated, the workers run unpinned instead.
    #[display("pinned")]
    PinToCores,
}

/// The processor each worker pins itself to, resolved once per pool run.
#[derive(Debug)]
pub(crate) struct CorePins {
    /// Single-processor sets in ascending processor ID order. Empty when not pinning.
    cores: Box<[(ProcessorId, ProcessorSet)]>,
}

impl CorePins {
    pub(crate) fn resolve(affinity: Affinity) -> Self {
        match affinity {
            Affinity::Unpinned => Self::unpinned(),
            Affinity::PinToCores => Self::available_cores(),
        }
    }

    fn unpinned() -> Self {
        Self {
            cores: Box::default(),
        }
    }

    #[cfg_attr(test, mutants::skip)] // Depends on the processors of the test machine.
    fn available_cores() -> Self {
        let Some(available) = ProcessorSetBuilder::new().take_all() else {
            tracing::debug!("no processors could be enumerated, workers will run unpinned");
            return Self::unpinned();
        };

        let mut ids = available
            .processors()
            .iter()
            .map(|processor| processor.id())
            .collect::<Vec<_>>();
        ids.sort_unstable();

        let cores = ids
            .into_iter()
            .filter_map(|id| {
                let single = ProcessorSetBuilder::new()
                    .filter(|processor| processor.id() == id)
                    .take_all();

                if single.is_none() {
                    tracing::debug!(processor = id, "processor vanished during enumeration");
                }

                single.map(|set| (id, set))
            })
            .collect::<Box<[_]>>();

        if cores.is_empty() {
            tracing::debug!("no processor could be selected, workers will run unpinned");
        } else {
            tracing::debug!(processors = cores.len(), "resolved processors for pinning");
        }

        Self { cores }
    }

    /// The processor that `worker` pins itself to, if pinning.
    pub(crate) fn for_worker(&self, worker: WorkerId) -> Option<(ProcessorId, &ProcessorSet)> {
        if self.cores.is_empty() {
            return None;
        }

        let (id, set) = self.cores.get(worker.index() % self.cores.len())?;

        Some((*id, set))
    }

    /// Whether any worker will be pinned.
    pub(crate) fn is_pinning(&self) -> bool {
        !self.cores.is_empty()
    }
}
