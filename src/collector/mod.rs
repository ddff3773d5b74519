//! Use collection: the generic traversal driver (`base`), the classifier
//! that turns traversal events into recorded uses (`iwyu`), and the
//! template-instantiation replay pass that reattributes uses made inside
//! template bodies back to the instantiating caller (`replayer`).

pub mod base;
pub mod iwyu;
pub mod replayer;
