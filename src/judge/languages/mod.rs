//! Built-in language profiles.

pub mod cpp;
pub mod java;
pub mod python;
pub mod rust;

use crate::judge::profile::LanguageProfile;

/// Profiles available without any configuration.
pub fn builtin_profiles() -> Vec<LanguageProfile> {
    vec![
        python::profile(),
        cpp::profile(),
        java::profile(),
        rust::profile(),
    ]
}
