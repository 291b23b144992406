//! Binary Reader / Writer
//!
//! Random-access typed readers and writers over byte buffers, used by the
//! container index parsers and the cooked payload decoders. All multi-byte
//! integers are little-endian on disk regardless of host; parsing is
//! explicit per field, never a struct cast.
//!
//! The writer half exists for the emit side of the cooking pipeline (index
//! and payload authoring); the loader itself only reads.

mod reader;
mod writer;

pub use reader::BinaryReader;
pub use writer::BinaryWriter;
