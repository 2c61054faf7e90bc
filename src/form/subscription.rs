//! Subscription masks.
//!
//! A listener names the exact state keys it cares about; the engine only calls
//! it when one of those keys changes. Asking for fewer keys never changes what
//! a listener sees, only how often it is called.

bitflags::bitflags! {
    /// Field-level state keys.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldSubscription: u32 {
        const ACTIVE                     = 1 << 0;
        const DATA                       = 1 << 1;
        const DIRTY                      = 1 << 2;
        const DIRTY_SINCE_LAST_SUBMIT    = 1 << 3;
        const ERROR                      = 1 << 4;
        const INITIAL                    = 1 << 5;
        const INVALID                    = 1 << 6;
        const LENGTH                     = 1 << 7;
        const MODIFIED                   = 1 << 8;
        const MODIFIED_SINCE_LAST_SUBMIT = 1 << 9;
        const PRISTINE                   = 1 << 10;
        const SUBMIT_ERROR               = 1 << 11;
        const SUBMIT_FAILED              = 1 << 12;
        const SUBMIT_SUCCEEDED           = 1 << 13;
        const SUBMITTING                 = 1 << 14;
        const TOUCHED                    = 1 << 15;
        const VALID                      = 1 << 16;
        const VALIDATING                 = 1 << 17;
        const VALUE                      = 1 << 18;
        const VISITED                    = 1 << 19;
    }
}

bitflags::bitflags! {
    /// Form-level state keys.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormSubscription: u32 {
        const ACTIVE                = 1 << 0;
        const DIRTY                 = 1 << 1;
        const DIRTY_FIELDS          = 1 << 2;
        const ERRORS                = 1 << 3;
        const HAS_VALIDATION_ERRORS = 1 << 4;
        const INITIAL_VALUES        = 1 << 5;
        const INVALID               = 1 << 6;
        const MODIFIED              = 1 << 7;
        const PRISTINE              = 1 << 8;
        const SUBMIT_ERRORS         = 1 << 9;
        const SUBMIT_FAILED         = 1 << 10;
        const SUBMIT_SUCCEEDED      = 1 << 11;
        const SUBMITTING            = 1 << 12;
        const TOUCHED               = 1 << 13;
        const VALID                 = 1 << 14;
        const VALIDATING            = 1 << 15;
        const VALUES                = 1 << 16;
        const VISITED               = 1 << 17;
    }
}

impl Default for FieldSubscription {
    fn default() -> Self {
        Self::all()
    }
}

impl Default for FormSubscription {
    fn default() -> Self {
        Self::all()
    }
}
