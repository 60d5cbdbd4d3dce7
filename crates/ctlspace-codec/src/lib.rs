// Author: Lukas Bower
// Purpose: Provide control-space structure types and codec primitives for fabric management.
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![no_std]

//! Bit-packed control-space structure codec shared across latticefm crates.
//!
//! Control structures are self-describing regions of a component's control
//! address space. Each begins with a `(type, vers, size)` header; most have a
//! fixed layout, while page-table entries have a layout computed from
//! capability bits read out of the owning page grid. This crate decodes and
//! encodes both kinds given nothing but a byte buffer (plus, for computed
//! layouts, the capability bits).

extern crate alloc;

#[cfg(test)]
extern crate std;

mod bits;
mod layout;
mod structs;
mod types;

pub use bits::{get_bits, is_sentinel, set_bits};
pub use layout::{FieldSpec, Layout, PackedEntry, PageTableCaps, page_table_layout};
pub use structs::{
    AccessTableRow, CoreStruct, DestTableRow, InterfaceStruct, PageGridStruct, StructView,
    SwitchStruct,
};
pub use types::{CodecError, StructHeader, StructPtr, StructType, Uuid128, STRUCT_PTR_UNIT};
