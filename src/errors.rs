//! Crate-wide error types.
//!
//! Follows the taxonomy of Configuration / I/O / Numeric errors: anything a
//! user can get wrong in a parameter file or at a module boundary surfaces as
//! one of these, with a `chain_err`-built trail back to the root cause.
//! Silent "policy" behaviour (clamping electron density to zero, returning
//! zero for an out-of-box sample) is not represented here at all -- it never
//! reaches an `Err`.

error_chain! {
    foreign_links {
        Io(::std::io::Error);
        Toml(::toml::de::Error);
    }

    errors {
        Configuration(msg: String) {
            description("invalid configuration")
            display("configuration error: {}", msg)
        }
        Numeric(msg: String) {
            description("numeric invariant violated")
            display("numeric error: {}", msg)
        }
    }
}
