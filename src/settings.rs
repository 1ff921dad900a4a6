use thiserror::Error;

// minimum and maximum values for the log-base-2 of the number of registers
// in the sketch
const MINIMUM_P_PARAM: u32 = 4;
const MAXIMUM_P_PARAM: u32 = 25;

// caps applied to the derived sparse-mode capacities
const MAXIMUM_DEFAULT_LIST_SIZE: u64 = 1 << 20;
const MAXIMUM_DEFAULT_BUFFER_SIZE: usize = 200_000;

/// Settings configure a sketch: its register count, its hash seed, and the
/// capacity limits of the sparse representation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Settings {
    /// p determines the number of registers in the sketch, calculated as
    /// 2^p. The minimum value is 4 and the maximum value is 25.
    pub(crate) p: u32,

    /// seed is passed to MurmurHash64A for every element. Two sketches must
    /// share a seed for a merge between them to be meaningful; this is not
    /// enforced.
    pub(crate) seed: u64,

    /// sparse controls whether the sketch starts in the sparse
    /// representation. Once a sparse sketch converts to dense it never
    /// converts back.
    pub(crate) sparse: bool,

    /// Number of registers, 2^p.
    pub(crate) registers: u64,

    /// max_list_size is the resident sparse-list length at which the sketch
    /// converts to the dense representation.
    pub(crate) max_list_size: usize,

    /// max_buffer_size is the number of pending writes the sparse insert
    /// buffer holds before it is flushed into the list.
    pub(crate) max_buffer_size: usize,
}

#[derive(Clone, Debug, Error)]
pub enum SettingsError {
    #[error("p must be between {MINIMUM_P_PARAM} and {MAXIMUM_P_PARAM}")]
    Precision,
}

impl Settings {
    /// Validates `p` and resolves the sparse capacities. Passing 0 for
    /// either capacity selects a default derived from the register count.
    pub fn new(
        p: u32,
        seed: u64,
        sparse: bool,
        max_list_size: usize,
        max_buffer_size: usize,
    ) -> Result<Self, SettingsError> {
        if !(MINIMUM_P_PARAM..=MAXIMUM_P_PARAM).contains(&p) {
            return Err(SettingsError::Precision);
        }

        let registers = 1u64 << p;
        let max_list_size = match max_list_size {
            0 => Self::default_list_size(registers),
            n => n,
        };
        let max_buffer_size = match max_buffer_size {
            0 => Self::default_buffer_size(max_list_size),
            n => n,
        };

        Ok(Self {
            p,
            seed,
            sparse,
            registers,
            max_list_size,
            max_buffer_size,
        })
    }

    // A quarter of the registers, held between 2 and 2^20. Past the upper
    // cap the dense array is cheaper than the list it would replace.
    fn default_list_size(registers: u64) -> usize {
        let default_size = registers / 4;

        if default_size > MAXIMUM_DEFAULT_LIST_SIZE {
            MAXIMUM_DEFAULT_LIST_SIZE as usize
        } else if default_size <= 4 {
            2
        } else {
            default_size as usize
        }
    }

    // Half the list cap, bounded so a large list does not imply an equally
    // large staging buffer. Never zero: a zero-capacity buffer could not
    // stage even a single write.
    fn default_buffer_size(max_list_size: usize) -> usize {
        (max_list_size / 2).min(MAXIMUM_DEFAULT_BUFFER_SIZE).max(1)
    }
}

#[cfg(test)]
mod test {
    use super::Settings;

    #[test]
    fn derived_defaults() {
        let settings = Settings::new(12, 0, true, 0, 0).unwrap();
        assert_eq!(1 << 12, settings.registers);
        assert_eq!(1024, settings.max_list_size);
        assert_eq!(512, settings.max_buffer_size);

        // Tiny register counts floor the list at 2 and the buffer at 1.
        let settings = Settings::new(4, 0, true, 0, 0).unwrap();
        assert_eq!(2, settings.max_list_size);
        assert_eq!(1, settings.max_buffer_size);

        // The list default caps at 2^20 for the largest precisions.
        let settings = Settings::new(25, 0, true, 0, 0).unwrap();
        assert_eq!(1 << 20, settings.max_list_size);
        assert_eq!(200_000, settings.max_buffer_size);
    }

    #[test]
    fn explicit_capacities_pass_through() {
        let settings = Settings::new(10, 42, true, 64, 16).unwrap();
        assert_eq!(64, settings.max_list_size);
        assert_eq!(16, settings.max_buffer_size);
    }

    #[test]
    fn precision_out_of_range() {
        assert!(Settings::new(3, 0, false, 0, 0).is_err());
        assert!(Settings::new(26, 0, false, 0, 0).is_err());
        assert!(Settings::new(4, 0, false, 0, 0).is_ok());
        assert!(Settings::new(25, 0, false, 0, 0).is_ok());
    }
}
