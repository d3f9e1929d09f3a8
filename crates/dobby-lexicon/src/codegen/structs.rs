use crate::compiler::{Lexicon, StructDef};
use crate::error::Result;

use super::{CodeGenerator, field_binding};
use super::templates::{Bindings, Render, StructModule, StructsBindings, TemplateId};

impl<R: Render> CodeGenerator<R> {
    /// Render the struct artifact: one module per struct definition, in key order
    pub(super) fn generate_structs(&self, lexicon: &Lexicon, structs: &[StructDef]) -> Result<String> {
        let modules = structs
            .iter()
            .map(|def| StructModule {
                module: lexicon.module_name(&def.key),
                description: def.description.as_ref().map(ToString::to_string),
                fields: def.fields.iter().map(field_binding).collect(),
            })
            .collect();
        let bindings = StructsBindings {
            nsid: lexicon.nsid.to_string(),
            modules,
        };
        self.renderer
            .render(TemplateId::Structs, &Bindings::Structs(bindings))
    }
}
