mod basic;
mod collection;
mod descriptor;
mod error;
mod parser;
mod render;

pub use basic::{
    sign_extend, BasicItem, BasicItems, GlobalItem, ItemType, LocalItem, MainItem, RawItem,
    RawItems,
};
pub use collection::{Collection, CollectionType, Field, FieldKind};
pub use descriptor::{DescriptorTree, ReportDescriptor};
pub use error::{HidError, Result};
pub use render::annotate;
