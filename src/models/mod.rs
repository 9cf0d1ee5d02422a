pub mod data;
pub mod element;
pub mod field;
pub mod form;
pub mod rule_filter;
pub mod sub_form;
pub mod template;
