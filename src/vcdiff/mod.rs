// VCDIFF format implementation (RFC 3284).
//
// - `varint`        base-128 big-endian integers
// - `header`        file header and window record headers
// - `address_cache` NEAR/SAME cache for COPY addresses
// - `code_table`    default instruction code table
// - `window`        source+target buffer and delta sections
// - `encoder`       match finding and instruction encoding
// - `decoder`       instruction replay and inspection

pub mod address_cache;
pub mod code_table;
pub mod decoder;
pub mod encoder;
pub mod header;
pub mod varint;
pub mod window;

pub use address_cache::AddressCache;
pub use code_table::{CodeTable, CodeTableEntry, DEFAULT_CODE_TABLE, InstType, Instruction};
pub use decoder::{Decoder, InstructionIterator};
pub use encoder::{Encoder, InstructionWriter};
pub use header::{FileHeader, VCDIFF_MAGIC, WindowHeader};
pub use window::Window;
