mod hash_types;
pub use self::hash_types::*;

mod version;
pub use self::version::*;
