#![allow(clippy::collapsible_if)]

pub mod language;
pub mod runtime;
