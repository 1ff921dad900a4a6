use dense::DenseRegisters;
use histogram::Histogram;
use sparse::SparseStore;
use thiserror::Error;

mod bitpack;
mod dense;
mod estimator;
mod hash;
mod histogram;
mod settings;
mod sparse;

pub use settings::{Settings, SettingsError};

#[derive(Clone, Debug, Error)]
pub enum HllError {
    #[error("{0}")]
    Settings(#[from] SettingsError),
    #[error("register counts must match when merging sketches")]
    IncompatibleSize,
}

/// Backing storage for the registers. A sketch starts in one of the two
/// and may move from `Sparse` to `Dense`, never back.
#[derive(Clone, Debug)]
enum Repr {
    Sparse(SparseStore),
    Dense(DenseRegisters),
}

/// A HyperLogLog cardinality estimator over `2^p` six-bit registers.
///
/// Register updates run through one of two representations: an ordered
/// list holding only the non-zero registers, buffered to amortize the cost
/// of keeping it sorted, and a bit-packed array once the list outgrows its
/// cap. A histogram of register values is maintained on every mutation, so
/// estimation folds 65 buckets instead of scanning `2^p` registers.
///
/// A sketch is a strictly sequential object and is not safe to mutate
/// concurrently. Callers that fan work across threads should keep one
/// sketch per worker and [`merge`](HyperLogLog::merge) at the end.
#[derive(Clone, Debug)]
pub struct HyperLogLog {
    settings: Settings,
    repr: Repr,
    histogram: Histogram,
    added: u64,
    cache: Option<u64>,
}

impl HyperLogLog {
    pub fn new(settings: Settings) -> Self {
        let repr = if settings.sparse {
            Repr::Sparse(SparseStore::new(settings.max_buffer_size))
        } else {
            Repr::Dense(DenseRegisters::new(settings.registers))
        };

        Self {
            histogram: Histogram::new(settings.registers),
            added: 0,
            cache: None,
            repr,
            settings,
        }
    }

    /// Builds a sketch straight from the raw parameters; 0 for either
    /// capacity picks the derived default.
    pub fn with_params(
        p: u32,
        seed: u64,
        sparse: bool,
        max_list_size: usize,
        max_buffer_size: usize,
    ) -> Result<Self, HllError> {
        let settings = Settings::new(p, seed, sparse, max_list_size, max_buffer_size)?;

        Ok(Self::new(settings))
    }

    /// Adds one element, treated as an opaque byte sequence.
    ///
    /// Returns whether the write may have raised a register. The dense
    /// answer is exact; a sparse sketch reports `true` for every buffered
    /// write because the outcome is only decided when the buffer is
    /// reconciled.
    pub fn add(&mut self, data: &[u8]) -> bool {
        self.add_raw(self.hash(data))
    }

    /// Feeds an already-hashed value to the sketch.
    pub fn add_raw(&mut self, hash: u64) -> bool {
        self.added += 1;
        let (index, rank) = hash::split_hash(hash, self.settings.p);

        self.apply(index, rank)
    }

    /// Estimated number of distinct elements added so far.
    ///
    /// Memoized until the next register change. A sparse sketch reconciles
    /// its buffer first so the histogram covers every pending write.
    pub fn cardinality(&mut self) -> u64 {
        if let Some(estimate) = self.cache {
            return estimate;
        }

        if let Repr::Sparse(store) = &mut self.repr {
            if store.has_buffered() {
                store.flush(&mut self.histogram);
            }
        }

        let estimate = estimator::estimate(&self.histogram, self.settings.p);
        self.cache = Some(estimate);

        estimate
    }

    /// Merges `other` into `self` register by register, keeping the larger
    /// value on each.
    ///
    /// The register counts must match; the seeds are the caller's
    /// responsibility. `other` is read through its list and pending buffer
    /// and is never modified. A sparse destination that crosses its list
    /// cap mid-merge converts to dense and takes the remaining writes
    /// densely.
    pub fn merge(&mut self, other: &Self) -> Result<(), HllError> {
        if self.settings.registers != other.settings.registers {
            return Err(HllError::IncompatibleSize);
        }

        self.cache = None;

        match &other.repr {
            Repr::Sparse(store) => {
                for (index, rank) in store.entries() {
                    self.apply(index as u64, rank);
                }
                for (index, rank) in store.buffered() {
                    self.apply(index as u64, rank);
                }
            }
            Repr::Dense(registers) => {
                for (index, rank) in registers.iter() {
                    if rank > 0 {
                        self.apply(index, rank);
                    }
                }
            }
        }

        Ok(())
    }

    /// Current value of a register, or 0 when `index` is out of range.
    ///
    /// A sparse sketch reconciles its buffer before answering and keeps a
    /// cursor at the matched node, so ascending probes walk the list once.
    pub fn get_register(&mut self, index: u64) -> u8 {
        if index >= self.settings.registers {
            return 0;
        }

        match &mut self.repr {
            Repr::Sparse(store) => store.get(index as u32, &mut self.histogram),
            Repr::Dense(registers) => registers.get(index),
        }
    }

    /// Number of registers, 2^p.
    pub fn size(&self) -> u64 {
        self.settings.registers
    }

    pub fn seed(&self) -> u64 {
        self.settings.seed
    }

    /// Total `add` calls observed, duplicates included.
    pub fn added(&self) -> u64 {
        self.added
    }

    /// Whether the sketch is still in the sparse representation.
    pub fn is_sparse(&self) -> bool {
        matches!(self.repr, Repr::Sparse(_))
    }

    /// MurmurHash64A of `data` under this sketch's seed.
    pub fn hash(&self, data: &[u8]) -> u64 {
        hash::murmur64a(data, self.settings.seed)
    }

    /// Raises register `index` to `rank` if `rank` is greater, through
    /// whichever representation is current.
    fn apply(&mut self, index: u64, rank: u8) -> bool {
        match &mut self.repr {
            Repr::Sparse(store) => {
                store.set(index as u32, rank, &mut self.histogram);
                if store.len() >= self.settings.max_list_size {
                    self.promote();
                }
                self.cache = None;

                true
            }
            Repr::Dense(registers) => {
                let current = registers.get(index);
                if rank <= current {
                    return false;
                }

                registers.set(index, rank);
                self.histogram.transfer(current, rank);
                self.cache = None;

                true
            }
        }
    }

    /// Converts a sparse sketch to the dense representation. The buffer is
    /// reconciled, every resident register is written into a fresh packed
    /// array, and the list is released. The histogram was maintained
    /// identically in both representations and carries over unchanged.
    fn promote(&mut self) {
        let Repr::Sparse(store) = &mut self.repr else {
            return;
        };

        store.flush(&mut self.histogram);

        let mut registers = DenseRegisters::new(self.settings.registers);
        for (index, rank) in store.entries() {
            registers.set(index as u64, rank);
        }

        self.repr = Repr::Dense(registers);
    }
}
