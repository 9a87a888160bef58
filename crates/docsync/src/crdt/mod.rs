//! CRDT tree: elements, their container algorithms, and the root registry.

pub mod element;
pub mod rga;
pub mod rht;
pub mod root;
pub mod text;

pub use element::{
    ArrayElement, Element, ElementIndex, ElementKind, ElementMeta, ElementValue, ObjectElement,
    Primitive, PrimitiveElement, SimpleElement, TextElement,
};
pub use rga::RgaList;
pub use rht::ElementRht;
pub use root::Root;
pub use text::{LatestByActor, TextPos, TextRga};
