//! Wire protocol codec (spec §4.6): message shapes, batching, and the
//! priority-suffix convention on property keys.

pub mod codec;
pub mod error;
pub mod priority;

pub use codec::{
    CreateData, DecodedBatch, ErrorData, Message, UpdateData, VarIdData, decode_frame,
    encode_messages,
};
pub use error::CodecError;
pub use priority::{Priority, split_priority, split_properties};
