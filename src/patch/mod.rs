pub mod convert;
pub mod naming;

pub use convert::{CommandConverter, ConvertError, PatchConverter};
pub use naming::derive_filenames;
