pub mod mei_tree;
pub mod primitive_parser;
pub mod tab_parser;
