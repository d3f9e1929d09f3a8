use crate::error::Result;
use dobby_common::types::tid::{CLOCK_ID_BITS, S32_CHAR, TID_LEN};
use std::path::PathBuf;

use super::templates::{Bindings, CommonBindings, Render, TemplateId};
use super::{CodeGenerator, GeneratedFile};

/// Common support files, written at the output root
pub const COMMON_FILES: &[(TemplateId, &str)] = &[
    (TemplateId::CommonTid, "lexicon_tid.ex"),
    (TemplateId::CommonXrpc, "lexicon_xrpc.ex"),
];

impl<R: Render> CodeGenerator<R> {
    fn common_bindings(&self) -> CommonBindings {
        CommonBindings {
            runtime_module: self.runtime_module.clone(),
            tid_alphabet: S32_CHAR.iter().copied().map(char::from).collect(),
            tid_length: TID_LEN,
            clock_id_bits: CLOCK_ID_BITS,
        }
    }

    /// Render the document-independent support files
    pub fn generate_common(&self) -> Result<Vec<GeneratedFile>> {
        let bindings = Bindings::Common(self.common_bindings());
        COMMON_FILES
            .iter()
            .map(|(template, file_name)| {
                Ok(GeneratedFile {
                    path: PathBuf::from(*file_name),
                    contents: self.renderer.render(*template, &bindings)?,
                })
            })
            .collect()
    }
}
