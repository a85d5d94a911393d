//! A toolchain for worm, a restricted integer-only subset of an
//! indentation-sensitive scripting language, featuring:
//! - a compiler that lowers worm source to SLIM assembly text
//! - a SLIM assembler
//! - a SLIM virtual machine

pub mod compiler;
pub mod console;
pub mod logging;
pub mod slim;
pub mod validation;
