//! Size and alignment of interned types.
//!
//! ## Notes
//! - Scalars follow the primitive registry; pointers, references and function values are one word.
//! - Strings, slices and boxed values are two words (`pointeur` + `taille`/`info`).
//! - Fixed-size arrays take the element alignment; structs are laid out in declaration order with
//!   natural padding and a size rounded up to their alignment.
//! - Enums delegate to their backing integer type.

use kuri_core::lang::primitives;

use super::{CompoundKind, CompoundState, RegistryInner, TypeError, TypeIndex, TypeToken};

const WORD: u64 = 8;

/// Largest object size the generated C can index with `int64_t`.
const MAX_SIZE: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    pub size: u64,
    pub alignment: u64,
}

impl Layout {
    pub const WORD: Layout = Layout {
        size: WORD,
        alignment: WORD,
    };

    pub const TWO_WORDS: Layout = Layout {
        size: 2 * WORD,
        alignment: WORD,
    };
}

/// `offset` rounded up to `alignment`, or `None` past [`MAX_SIZE`].
pub(crate) fn align_up(offset: u64, alignment: u64) -> Option<u64> {
    if alignment <= 1 {
        return Some(offset);
    }
    offset.div_ceil(alignment).checked_mul(alignment).filter(|&size| size <= MAX_SIZE)
}

fn checked_size(size: Option<u64>) -> Option<u64> {
    size.filter(|&size| size <= MAX_SIZE)
}

impl RegistryInner {
    pub(super) fn layout_of(&mut self, index: TypeIndex) -> Result<Layout, TypeError> {
        if let Some(layout) = self.layouts.get(&index) {
            return Ok(*layout);
        }
        let descriptor = self.descriptor(index)?.clone();
        let layout = match descriptor.outer() {
            Some(TypeToken::Primitive(id)) => {
                let info = primitives::info_for(*id);
                Layout {
                    size: info.size,
                    alignment: info.alignment,
                }
            }
            Some(TypeToken::Null | TypeToken::Pointer | TypeToken::Reference | TypeToken::Function(_)) => {
                Layout::WORD
            }
            Some(TypeToken::Slice) => Layout::TWO_WORDS,
            Some(TypeToken::Array(len)) => {
                let len = *len;
                let element = self.element_index(index)?;
                let element = self.layout_of(element)?;
                let size = checked_size(element.size.checked_mul(len))
                    .ok_or_else(|| TypeError::TooLarge(self.display(index)))?;
                Layout {
                    size,
                    alignment: element.alignment,
                }
            }
            Some(TypeToken::Compound(id)) => {
                let compound = self.compound(*id)?;
                if compound.state != CompoundState::Finalized {
                    return Err(TypeError::Incomplete(compound.name.clone()));
                }
                Layout {
                    size: compound.size,
                    alignment: compound.alignment,
                }
            }
            None => return Err(TypeError::UnknownType(index.0)),
        };
        self.layouts.insert(index, layout);
        Ok(layout)
    }

    fn element_index(&self, index: TypeIndex) -> Result<TypeIndex, TypeError> {
        let descriptor = self.descriptor(index)?;
        descriptor
            .inner()
            .and_then(|inner| self.lookup.get(&inner).copied())
            .ok_or_else(|| TypeError::InvalidDereference(self.display(index)))
    }

    pub(super) fn finalize(&mut self, id: super::CompoundId) -> Result<Layout, TypeError> {
        let compound = self.compound(id)?.clone();
        if compound.state == CompoundState::Finalized {
            return Ok(Layout {
                size: compound.size,
                alignment: compound.alignment,
            });
        }
        if compound.kind != CompoundKind::Struct {
            return Err(TypeError::Incomplete(compound.name));
        }

        let too_large = || TypeError::TooLarge(compound.name.clone());
        let mut offset = 0;
        let mut alignment = 1;
        let mut offsets = Vec::with_capacity(compound.fields.len());
        for field in &compound.fields {
            let layout = self.layout_of(field.ty)?;
            offset = align_up(offset, layout.alignment).ok_or_else(too_large)?;
            offsets.push(offset);
            offset = checked_size(offset.checked_add(layout.size)).ok_or_else(too_large)?;
            alignment = alignment.max(layout.alignment);
        }
        let size = align_up(offset, alignment).ok_or_else(too_large)?;

        let entry = self.compound_mut(id)?;
        for (field, offset) in entry.fields.iter_mut().zip(offsets) {
            field.offset = offset;
        }
        entry.size = size;
        entry.alignment = alignment;
        entry.state = CompoundState::Finalized;
        Ok(Layout { size, alignment })
    }
}
