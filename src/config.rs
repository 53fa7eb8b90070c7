//! Engine options, loadable from a JSON file.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::draft::{Draft, default_draft};
use crate::equality::ArrayEquality;
use crate::error::{Error, Result};
use crate::path_de::from_slice_with_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Draft assumed for documents without `$schema`.
    pub draft: Draft,
    /// Reject multi-type schemas that carry type-specific keywords.
    pub enforce_single_type: bool,
    pub array_equality: ArrayEquality,
    /// `false` demotes `format` to an annotation.
    pub assert_formats: bool,
    pub assert_content: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            draft: default_draft(),
            enforce_single_type: false,
            array_equality: ArrayEquality::default(),
            assert_formats: true,
            assert_content: true,
        }
    }
}

impl Options {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
        Ok(from_slice_with_path(&bytes)?)
    }

    pub fn draft(mut self, draft: Draft) -> Self {
        self.draft = draft;
        self
    }

    pub fn enforce_single_type(mut self, on: bool) -> Self {
        self.enforce_single_type = on;
        self
    }

    pub fn array_equality(mut self, mode: ArrayEquality) -> Self {
        self.array_equality = mode;
        self
    }

    pub fn assert_formats(mut self, on: bool) -> Self {
        self.assert_formats = on;
        self
    }

    pub fn assert_content(mut self, on: bool) -> Self {
        self.assert_content = on;
        self
    }
}
