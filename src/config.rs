//! Field configuration (spec.md §6, "Field configuration (input)").

use crate::error::ConfigError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldConfig {
    pub max_field_width: u32,
    pub max_register_width: u32,
    pub vectorise: bool,
}

impl FieldConfig {
    /// Builds a `FieldConfig`, rejecting widths that would make splitting
    /// impossible rather than panicking later inside the splitter.
    pub fn validate(
        max_field_width: u32,
        max_register_width: u32,
        vectorise: bool,
    ) -> Result<FieldConfig, ConfigError> {
        if max_register_width == 0 {
            return Err(ConfigError::ZeroWidth);
        }
        if max_register_width > max_field_width {
            return Err(ConfigError::RegisterWiderThanField {
                max_register_width,
                max_field_width,
            });
        }
        Ok(FieldConfig {
            max_field_width,
            max_register_width,
            vectorise,
        })
    }
}
